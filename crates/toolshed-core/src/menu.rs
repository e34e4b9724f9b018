//! Menu assembly.
//!
//! The menu is built once: header, body, and footer subtrees are fetched
//! concurrently, then composed on the affinity context as
//! `header + separator + body` (the top menu) and `footer`. Consumers obtain
//! the result through a [`MenuHandle`], which never exposes a partially
//! composed menu.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use toolshed_config::Placement;
use tracing::{debug, info, warn};

use crate::BoxFuture;
use crate::affinity::{DispatchError, Priority, UiDispatcher, run_on_affinity};
use crate::catalog::{MatchedProvider, ToolCatalog};

/// One of the three menu regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuSection {
    Header,
    Body,
    Footer,
}

impl fmt::Display for MenuSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MenuSection::Header => "header",
            MenuSection::Body => "body",
            MenuSection::Footer => "footer",
        })
    }
}

/// Errors from menu composition.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MenuError {
    #[error("failed to fetch {section} tools: {reason}")]
    Source { section: MenuSection, reason: String },

    #[error("menu composition failed: {0}")]
    Failed(String),

    #[error("menu was never composed")]
    Abandoned,

    #[error("menu could not be published: {0}")]
    Dispatch(String),
}

impl From<DispatchError> for MenuError {
    fn from(e: DispatchError) -> Self {
        MenuError::Dispatch(e.to_string())
    }
}

/// An entry of the top menu.
#[derive(Debug, Clone)]
pub enum MenuItem {
    Tool(Arc<MatchedProvider>),
    Separator,
}

impl MenuItem {
    pub fn tool(&self) -> Option<&Arc<MatchedProvider>> {
        match self {
            MenuItem::Tool(tool) => Some(tool),
            MenuItem::Separator => None,
        }
    }
}

/// The composed menu.
#[derive(Debug, Clone, Default)]
pub struct Menu {
    top: Vec<MenuItem>,
    footer: Vec<Arc<MatchedProvider>>,
}

impl Menu {
    pub fn compose(
        header: Vec<Arc<MatchedProvider>>,
        body: Vec<Arc<MatchedProvider>>,
        footer: Vec<Arc<MatchedProvider>>,
    ) -> Self {
        let mut top = Vec::with_capacity(header.len() + body.len() + 1);
        top.extend(header.into_iter().map(MenuItem::Tool));
        top.push(MenuItem::Separator);
        top.extend(body.into_iter().map(MenuItem::Tool));
        Self { top, footer }
    }

    pub fn top(&self) -> &[MenuItem] {
        &self.top
    }

    pub fn footer(&self) -> &[Arc<MatchedProvider>] {
        &self.footer
    }

    /// First tool of the top menu, skipping separators.
    pub fn first_tool(&self) -> Option<&Arc<MatchedProvider>> {
        self.top.iter().find_map(MenuItem::tool)
    }

    /// Whether `tool` appears anywhere in the top menu tree.
    pub fn contains(&self, tool: &MatchedProvider) -> bool {
        self.top
            .iter()
            .filter_map(MenuItem::tool)
            .any(|item| item.contains(tool))
    }
}

/// Supplies the three menu subtrees.
pub trait MenuSource: Send + Sync {
    fn header_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>>;
    fn body_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>>;
    fn footer_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>>;
}

impl MenuSource for ToolCatalog {
    fn header_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>> {
        Box::pin(async move { Ok(self.placed(Placement::Header)) })
    }

    fn body_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>> {
        Box::pin(async move { Ok(self.placed(Placement::Body)) })
    }

    fn footer_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>> {
        Box::pin(async move { Ok(self.placed(Placement::Footer)) })
    }
}

#[derive(Debug, Clone)]
enum MenuState {
    Pending,
    Ready(Arc<Menu>),
    Failed(MenuError),
}

/// Composes the menu exactly once. Create with [`MenuAssembler::new`].
pub struct MenuAssembler {
    state_tx: watch::Sender<MenuState>,
}

/// Read side of the menu barrier.
#[derive(Clone)]
pub struct MenuHandle {
    state_rx: watch::Receiver<MenuState>,
}

impl MenuAssembler {
    pub fn new() -> (Self, MenuHandle) {
        let (state_tx, state_rx) = watch::channel(MenuState::Pending);
        (Self { state_tx }, MenuHandle { state_rx })
    }

    /// Fetch the three subtrees concurrently, compose them, and publish the
    /// menu on the affinity context.
    ///
    /// Any fetch failure is published to every waiting consumer and returned;
    /// no partial menu is ever published.
    pub async fn assemble(
        self,
        source: &dyn MenuSource,
        dispatcher: &dyn UiDispatcher,
    ) -> Result<Arc<Menu>, MenuError> {
        debug!("Building menu");

        let fetched = tokio::try_join!(
            source.header_tools(),
            source.body_tools(),
            source.footer_tools()
        );
        let (header, body, footer) = match fetched {
            Ok(sections) => sections,
            Err(e) => {
                warn!(error = %e, "Menu composition failed");
                self.state_tx.send_replace(MenuState::Failed(e.clone()));
                return Err(e);
            }
        };

        let menu = Arc::new(Menu::compose(header, body, footer));
        let published = Arc::clone(&menu);
        let state_tx = self.state_tx;
        run_on_affinity(dispatcher, Priority::Low, move || {
            state_tx.send_replace(MenuState::Ready(published));
        })
        .await?;

        info!(
            top = menu.top().len(),
            footer = menu.footer().len(),
            "Menu ready"
        );
        Ok(menu)
    }
}

impl MenuHandle {
    /// Wait for composition to finish.
    pub async fn ready(&self) -> Result<Arc<Menu>, MenuError> {
        let mut state_rx = self.state_rx.clone();
        let state = state_rx
            .wait_for(|state| !matches!(state, MenuState::Pending))
            .await
            .map_err(|_| MenuError::Abandoned)?;
        match &*state {
            MenuState::Ready(menu) => Ok(Arc::clone(menu)),
            MenuState::Failed(e) => Err(e.clone()),
            MenuState::Pending => Err(MenuError::Abandoned),
        }
    }

    /// The menu if it is already composed.
    pub fn try_get(&self) -> Option<Arc<Menu>> {
        match &*self.state_rx.borrow() {
            MenuState::Ready(menu) => Some(Arc::clone(menu)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use toolshed_config::tools::default_tools;

    use crate::affinity::{AffinityThread, InlineDispatcher};
    use crate::registry::ProviderRegistry;

    fn catalog() -> ToolCatalog {
        ToolCatalog::materialize(&ProviderRegistry::from_tools(&default_tools()).unwrap())
    }

    fn top_names(menu: &Menu) -> Vec<String> {
        menu.top()
            .iter()
            .map(|item| match item {
                MenuItem::Tool(tool) => tool.name().to_string(),
                MenuItem::Separator => "--".to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_menu_order() {
        let catalog = catalog();
        let (assembler, handle) = MenuAssembler::new();
        assert!(handle.try_get().is_none());

        let menu = assembler.assemble(&catalog, &InlineDispatcher).await.unwrap();
        assert_eq!(
            top_names(&menu),
            vec!["all-tools", "--", "converters", "encoders", "formatters", "generators"]
        );
        let footer: Vec<_> = menu.footer().iter().map(|t| t.name()).collect();
        assert_eq!(footer, vec!["settings"]);
        assert_eq!(menu.first_tool().unwrap().name(), "all-tools");
        assert!(handle.try_get().is_some());
    }

    #[tokio::test]
    async fn test_contains_searches_recursively() {
        let catalog = catalog();
        let (assembler, _handle) = MenuAssembler::new();
        let menu = assembler.assemble(&catalog, &InlineDispatcher).await.unwrap();

        assert!(menu.contains(&catalog.find_by_name("jwt").unwrap()));
        assert!(!menu.contains(&catalog.find_by_name("settings").unwrap()));
    }

    struct BrokenFooter(ToolCatalog);

    impl MenuSource for BrokenFooter {
        fn header_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>> {
            self.0.header_tools()
        }

        fn body_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>> {
            self.0.body_tools()
        }

        fn footer_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>> {
            Box::pin(async {
                Err(MenuError::Source {
                    section: MenuSection::Footer,
                    reason: "offline".to_string(),
                })
            })
        }
    }

    #[tokio::test]
    async fn test_failure_reaches_waiters() {
        let (assembler, handle) = MenuAssembler::new();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.ready().await })
        };

        let result = assembler.assemble(&BrokenFooter(catalog()), &InlineDispatcher).await;
        assert!(matches!(result, Err(MenuError::Source { section: MenuSection::Footer, .. })));

        let waited = waiter.await.unwrap();
        assert!(matches!(waited, Err(MenuError::Source { .. })));
        assert!(handle.try_get().is_none());
    }

    #[tokio::test]
    async fn test_dropped_assembler_is_abandoned() {
        let (assembler, handle) = MenuAssembler::new();
        drop(assembler);
        assert!(matches!(handle.ready().await, Err(MenuError::Abandoned)));
    }

    #[tokio::test]
    async fn test_publishes_through_affinity_thread() {
        let handle_ui = AffinityThread::spawn();
        let (assembler, handle) = MenuAssembler::new();
        let catalog = catalog();
        assembler.assemble(&catalog, &handle_ui).await.unwrap();
        let menu = handle.ready().await.unwrap();
        assert_eq!(menu.footer().len(), 1);
    }
}
