//! Mount Pipeline
//!
//! A [`Mount`] wires the pieces together for one template:
//!
//! ```text
//!   AstNode ──build──▶ shadow VNode ──render──▶ live tree (Renderer)
//!                         ▲      │
//!          Subscriber ────┘      └─diff(baseline, shadow)──▶ apply_patches
//!              ▲
//!   Store::write
//! ```
//!
//! Each binding site gets one [`Subscriber`]. When its value changes the
//! callback writes the new value into the *shadow* tree and asks the flush
//! scheduler for a pass. [`Mount::flush`] then diffs the *baseline* (the tree
//! the live nodes currently show) against the shadow, applies the patches
//! and makes the shadow the new baseline. Any number of writes between two
//! flushes cost one pass.
//!
//! With [`BindingMode::Direct`] a site patches its live node from inside the
//! callback and updates the baseline in step, so no pass is needed.
//!
//! Renderer calls from callbacks lock the renderer. Do not hold the guard
//! from [`Mount::renderer`] while writing to the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use tracing::{debug, instrument, trace, warn};

use crate::config::{BindingMode, RuntimeConfig};
use crate::diff::diff;
use crate::error::{MountError, RenderError};
use crate::patch::{apply_patches, render, Renderer};
use crate::reactive::{display, Evaluator, FlushScheduler, Path, Store, Subscriber};
use crate::vdom::{build, AstNode, BindingSite, SiteKind, VNode};

/// State shared between a mount and its subscriber callbacks.
#[derive(Debug)]
struct Pipeline {
    /// The tree as the store currently describes it.
    shadow: Mutex<VNode>,

    /// The tree the live nodes were last brought in line with.
    baseline: Mutex<VNode>,

    scheduler: FlushScheduler,

    /// Renderer failures from direct bindings, reported by the next flush.
    failures: Mutex<Vec<RenderError>>,
}

/// Forwards one site's value changes into the pipeline.
struct SiteWriter<R: Renderer> {
    site: BindingSite,
    mode: BindingMode,
    pipeline: Arc<Pipeline>,
    renderer: Arc<Mutex<R>>,
    target: Arc<OnceLock<R::Node>>,
}

impl<R: Renderer> SiteWriter<R> {
    fn write(&self, value: Option<&Value>) {
        self.site.apply_to(&mut self.pipeline.shadow.lock(), value);

        let target = match (self.mode, self.target.get()) {
            (BindingMode::Direct, Some(target)) => target,
            _ => {
                self.pipeline.scheduler.request();
                return;
            }
        };

        let result = {
            let mut renderer = self.renderer.lock();
            match (self.site.attribute(), value) {
                (None, _) => renderer.set_text(target, &display(value)),
                (Some(name), Some(_)) => renderer.set_attribute(target, name, &display(value)),
                (Some(name), None) => renderer.remove_attribute(target, name),
            }
        };

        match result {
            Ok(()) => {
                self.site.apply_to(&mut self.pipeline.baseline.lock(), value);
            }
            Err(err) => {
                warn!(node = ?self.site.node_path, %err, "direct binding failed");
                self.pipeline.failures.lock().push(err);
                self.pipeline.scheduler.request();
            }
        }
    }
}

/// A template mounted on a live tree and kept in sync with a store.
///
/// # Example
///
/// ```rust,ignore
/// let store = observe(json!({ "user": { "name": "Ann" } }));
/// let ast = AstNode::element("p").child(AstNode::text("Hi {{user.name}}"));
/// let mount = Mount::new(&ast, &store, MemoryTree::new(), &RuntimeConfig::default())?;
///
/// store.set("user.name", "Bo")?;
/// mount.flush()?;
/// assert_eq!(mount.renderer().to_markup(mount.root()), "<p>Hi Bo</p>");
/// ```
pub struct Mount<R: Renderer> {
    store: Store,
    config: RuntimeConfig,
    renderer: Arc<Mutex<R>>,
    root: R::Node,
    pipeline: Arc<Pipeline>,
    subscribers: Vec<Subscriber>,
    models: Vec<(R::Node, Path)>,
    passes: AtomicU64,
}

impl<R> Mount<R>
where
    R: Renderer + Send + 'static,
    R::Node: Send + Sync + 'static,
{
    /// Build `ast`, bind it to `store` and render it into `renderer`.
    pub fn new(
        ast: &AstNode,
        store: &Store,
        renderer: R,
        config: &RuntimeConfig,
    ) -> Result<Self, MountError> {
        Self::with_evaluator(ast, store, renderer, config, &Evaluator::from_config(config))
    }

    /// Like [`new`](Self::new), with an evaluator carrying custom filters.
    pub fn with_evaluator(
        ast: &AstNode,
        store: &Store,
        renderer: R,
        config: &RuntimeConfig,
        evaluator: &Evaluator,
    ) -> Result<Self, MountError> {
        config.validate()?;
        let blueprint = build(ast, evaluator, config);
        let pipeline = Arc::new(Pipeline {
            shadow: Mutex::new(blueprint.tree.clone()),
            baseline: Mutex::new(blueprint.tree.clone()),
            scheduler: FlushScheduler::new(),
            failures: Mutex::new(Vec::new()),
        });
        let renderer = Arc::new(Mutex::new(renderer));

        let mut subscribers = Vec::with_capacity(blueprint.sites.len());
        let mut targets = Vec::with_capacity(blueprint.sites.len());
        for site in &blueprint.sites {
            let target = Arc::new(OnceLock::new());
            let writer = SiteWriter {
                site: site.clone(),
                mode: config.binding_mode,
                pipeline: Arc::clone(&pipeline),
                renderer: Arc::clone(&renderer),
                target: Arc::clone(&target),
            };
            let subscriber = Subscriber::new(store, site.expression.clone(), move |value| {
                writer.write(value)
            })?;
            subscribers.push(subscriber);
            targets.push(target);
        }

        // Initial values are written before anything is rendered.
        let mut tree = blueprint.tree;
        for (site, subscriber) in blueprint.sites.iter().zip(&subscribers) {
            site.apply_to(&mut tree, subscriber.value().as_ref());
        }
        *pipeline.shadow.lock() = tree.clone();
        *pipeline.baseline.lock() = tree.clone();

        let (root, models) = {
            let mut live = renderer.lock();
            let root = render(&mut *live, &tree)?;

            let mut models = Vec::new();
            for (site, target) in blueprint.sites.iter().zip(&targets) {
                let Some(node) = locate(&*live, &root, &site.node_path) else {
                    continue;
                };
                if let SiteKind::Model { path } = &site.kind {
                    models.push((node.clone(), path.clone()));
                }
                target.get_or_init(|| node);
            }
            (root, models)
        };

        debug!(
            sites = subscribers.len(),
            models = models.len(),
            mode = ?config.binding_mode,
            "mounted"
        );

        Ok(Self {
            store: store.clone(),
            config: config.clone(),
            renderer,
            root,
            pipeline,
            subscribers,
            models,
            passes: AtomicU64::new(0),
        })
    }

    /// Bring the live tree in line with the store.
    ///
    /// Runs at most one diff/patch pass and returns whether it did. Inside a
    /// [`batch`](Self::batch) this does nothing; the batch flushes when it
    /// closes. A failed pass leaves the baseline untouched and stays pending,
    /// so the next flush retries the same changes.
    #[instrument(level = "debug", skip(self))]
    pub fn flush(&self) -> Result<bool, MountError> {
        if self.pipeline.scheduler.in_batch() {
            trace!("flush deferred to end of batch");
            return Ok(false);
        }

        let failures = std::mem::take(&mut *self.pipeline.failures.lock());
        let ran = self.pipeline.scheduler.take();
        if ran {
            if let Err(err) = self.run_pass() {
                self.pipeline.scheduler.request();
                for failure in &failures {
                    warn!(%failure, "direct binding failure superseded by failed pass");
                }
                return Err(err);
            }
        }

        match failures.into_iter().next() {
            Some(err) => Err(err.into()),
            None => Ok(ran),
        }
    }

    fn run_pass(&self) -> Result<(), MountError> {
        let next = self.pipeline.shadow.lock().clone();
        let patches = diff(&self.pipeline.baseline.lock(), &next);

        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(pass, patched = patches.len(), ops = patches.op_count(), "flush pass");

        if !patches.is_empty() {
            let mut renderer = self.renderer.lock();
            apply_patches(&mut *renderer, &self.root, &patches)?;
        }
        *self.pipeline.baseline.lock() = next;
        Ok(())
    }

    /// Run `writes` as one batch and flush once when the outermost batch
    /// closes.
    pub fn batch<T, F>(&self, writes: F) -> Result<T, MountError>
    where
        F: FnOnce(&Store) -> T,
    {
        let (output, outermost) = {
            let guard = self.pipeline.scheduler.enter();
            (writes(&self.store), guard.is_outermost())
        };
        if outermost {
            self.flush()?;
        }
        Ok(output)
    }

    /// Feed user input from a model-bound live node back into the store.
    ///
    /// Returns whether the store changed. A node without a model binding is
    /// ignored.
    pub fn input(&self, node: &R::Node, text: &str) -> Result<bool, MountError> {
        let Some((_, path)) = self.models.iter().find(|(model, _)| model == node) else {
            warn!(node = ?node, "input on a node without a model binding");
            return Ok(false);
        };
        Ok(self.store.write(path, Value::String(text.to_string()))?)
    }

    /// The live root node.
    pub fn root(&self) -> &R::Node {
        &self.root
    }

    /// Lock the renderer, e.g. to inspect the live tree.
    pub fn renderer(&self) -> MutexGuard<'_, R> {
        self.renderer.lock()
    }

    /// Number of diff/patch passes run so far.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// Whether a change is waiting for the next flush.
    pub fn is_pending(&self) -> bool {
        self.pipeline.scheduler.is_dirty()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Snapshot of the shadow tree.
    pub fn tree(&self) -> VNode {
        self.pipeline.shadow.lock().clone()
    }

    /// One subscriber per binding site, in document order.
    pub fn subscribers(&self) -> &[Subscriber] {
        &self.subscribers
    }

    /// Live nodes carrying a model binding.
    pub fn model_nodes(&self) -> impl Iterator<Item = &R::Node> + '_ {
        self.models.iter().map(|(node, _)| node)
    }
}

/// Follow a child path through the live tree.
fn locate<R: Renderer>(renderer: &R, root: &R::Node, path: &[usize]) -> Option<R::Node> {
    path.iter().try_fold(root.clone(), |node, &index| {
        renderer.children(&node).into_iter().nth(index)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::MemoryTree;
    use crate::reactive::observe;
    use serde_json::json;

    fn greeting() -> AstNode {
        AstNode::element("p")
            .attr(":class", "theme")
            .child(AstNode::text("Hi {{ user.name }}"))
    }

    fn markup(mount: &Mount<MemoryTree>) -> String {
        mount.renderer().to_markup(mount.root())
    }

    #[test]
    fn initial_render_shows_bound_values() {
        let store = observe(json!({ "user": { "name": "Ann" }, "theme": "dark" }));
        let mount = Mount::new(&greeting(), &store, MemoryTree::new(), &RuntimeConfig::default())
            .unwrap();

        assert_eq!(markup(&mount), "<p class=\"dark\">Hi Ann</p>");
        assert_eq!(mount.subscribers().len(), 2);
        assert_eq!(mount.passes(), 0);
        assert!(!mount.is_pending());
    }

    #[test]
    fn writes_wait_for_flush() {
        let store = observe(json!({ "user": { "name": "Ann" }, "theme": "dark" }));
        let mount = Mount::new(&greeting(), &store, MemoryTree::new(), &RuntimeConfig::default())
            .unwrap();

        store.set("user.name", "Bo").unwrap();
        store.set("theme", "light").unwrap();
        assert!(mount.is_pending());
        assert_eq!(markup(&mount), "<p class=\"dark\">Hi Ann</p>");

        assert!(mount.flush().unwrap());
        assert_eq!(markup(&mount), "<p class=\"light\">Hi Bo</p>");
        assert_eq!(mount.passes(), 1);

        assert!(!mount.flush().unwrap());
        assert_eq!(mount.passes(), 1);
    }

    #[test]
    fn unchanged_values_do_not_arm_a_pass() {
        let store = observe(json!({ "user": { "name": "Ann" }, "theme": "dark" }));
        let mount = Mount::new(&greeting(), &store, MemoryTree::new(), &RuntimeConfig::default())
            .unwrap();

        store.set("theme", "dark").unwrap();
        assert!(!mount.is_pending());
        assert!(!mount.flush().unwrap());
    }

    #[test]
    fn nested_batches_flush_once() {
        let store = observe(json!({ "user": { "name": "Ann" }, "theme": "dark" }));
        let mount = Mount::new(&greeting(), &store, MemoryTree::new(), &RuntimeConfig::default())
            .unwrap();

        mount
            .batch(|store| {
                store.set("user.name", "Bo").unwrap();
                mount
                    .batch(|store| store.set("theme", "light").unwrap())
                    .unwrap();
                assert_eq!(mount.passes(), 0);
            })
            .unwrap();

        assert_eq!(mount.passes(), 1);
        assert_eq!(markup(&mount), "<p class=\"light\">Hi Bo</p>");
    }

    #[test]
    fn undefined_attribute_is_removed() {
        let store = observe(json!({ "user": { "name": "Ann" }, "theme": "dark" }));
        let ast = AstNode::element("p").attr(":class", "missing");
        let mount = Mount::new(&ast, &store, MemoryTree::new(), &RuntimeConfig::default()).unwrap();

        assert_eq!(markup(&mount), "<p></p>");

        store.set("missing", "shown").unwrap();
        mount.flush().unwrap();
        assert_eq!(markup(&mount), "<p class=\"shown\"></p>");
    }

    #[test]
    fn direct_mode_patches_without_a_pass() {
        let store = observe(json!({ "user": { "name": "Ann" }, "theme": "dark" }));
        let config = RuntimeConfig {
            binding_mode: BindingMode::Direct,
            ..RuntimeConfig::default()
        };
        let mount = Mount::new(&greeting(), &store, MemoryTree::new(), &config).unwrap();

        store.set("user.name", "Bo").unwrap();
        assert_eq!(markup(&mount), "<p class=\"dark\">Hi Bo</p>");
        assert!(!mount.flush().unwrap());
        assert_eq!(mount.passes(), 0);
        assert_eq!(mount.tree().to_markup(), "<p class=\"dark\">Hi Bo</p>");
    }

    #[test]
    fn direct_failures_surface_on_flush() {
        let store = observe(json!({ "user": { "name": "Ann" }, "theme": "dark" }));
        let config = RuntimeConfig {
            binding_mode: BindingMode::Direct,
            ..RuntimeConfig::default()
        };
        let mount = Mount::new(&greeting(), &store, MemoryTree::new(), &config).unwrap();
        mount.renderer().reject_attribute("class");

        store.set("theme", "light").unwrap();
        let err = mount.flush().unwrap_err();
        assert!(matches!(err, MountError::Patch(_) | MountError::Render(_)));
    }

    /// Delegates to a [`MemoryTree`], refusing the next `set_attribute` once armed.
    #[derive(Default)]
    struct FailOnce {
        tree: MemoryTree,
        armed: bool,
    }

    impl Renderer for FailOnce {
        type Node = crate::patch::LiveId;

        fn create_element(&mut self, tag: &str) -> Self::Node {
            self.tree.create_element(tag)
        }

        fn create_text(&mut self, content: &str) -> Self::Node {
            self.tree.create_text(content)
        }

        fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str)
            -> Result<(), RenderError> {
            if std::mem::take(&mut self.armed) {
                return Err(RenderError::AttributeRejected {
                    name: name.to_string(),
                    reason: "transient failure".to_string(),
                });
            }
            self.tree.set_attribute(node, name, value)
        }

        fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> Result<(), RenderError> {
            self.tree.remove_attribute(node, name)
        }

        fn set_text(&mut self, node: &Self::Node, content: &str) -> Result<(), RenderError> {
            self.tree.set_text(node, content)
        }

        fn append_child(&mut self, parent: &Self::Node, child: &Self::Node)
            -> Result<(), RenderError> {
            self.tree.append_child(parent, child)
        }

        fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node)
            -> Result<(), RenderError> {
            self.tree.remove_child(parent, child)
        }

        fn replace_child(
            &mut self,
            parent: &Self::Node,
            old_child: &Self::Node,
            new_child: &Self::Node,
        ) -> Result<(), RenderError> {
            self.tree.replace_child(parent, old_child, new_child)
        }

        fn children(&self, node: &Self::Node) -> Vec<Self::Node> {
            self.tree.children(node)
        }

        fn parent(&self, node: &Self::Node) -> Option<Self::Node> {
            self.tree.parent(node)
        }
    }

    #[test]
    fn failed_pass_is_retried_on_next_flush() {
        let store = observe(json!({ "user": { "name": "Ann" }, "theme": "dark" }));
        let mount = Mount::new(&greeting(), &store, FailOnce::default(), &RuntimeConfig::default())
            .unwrap();
        mount.renderer().armed = true;

        store.set("theme", "light").unwrap();
        assert!(matches!(mount.flush(), Err(MountError::Patch(_))));
        assert!(mount.is_pending());
        assert_eq!(mount.renderer().tree.to_markup(mount.root()), "<p class=\"dark\">Hi Ann</p>");

        assert!(mount.flush().unwrap());
        assert!(!mount.is_pending());
        assert_eq!(mount.passes(), 2);
        assert_eq!(mount.renderer().tree.to_markup(mount.root()), "<p class=\"light\">Hi Ann</p>");
    }

    #[test]
    fn model_input_round_trips() {
        let store = observe(json!({ "form": { "email": "a@x" } }));
        let ast = AstNode::element("form")
            .child(AstNode::element("input").attr("v-model", "form.email"))
            .child(AstNode::element("span").child(AstNode::text("{{ form.email }}")));
        let mount = Mount::new(&ast, &store, MemoryTree::new(), &RuntimeConfig::default()).unwrap();

        let input = *mount.model_nodes().next().unwrap();
        assert!(mount.input(&input, "b@y").unwrap());
        mount.flush().unwrap();

        assert_eq!(store.get("form.email"), Some(json!("b@y")));
        assert_eq!(
            markup(&mount),
            "<form><input value=\"b@y\"></input><span>b@y</span></form>"
        );
    }

    #[test]
    fn input_on_unbound_node_is_ignored() {
        let store = observe(json!({ "user": { "name": "Ann" }, "theme": "dark" }));
        let mount = Mount::new(&greeting(), &store, MemoryTree::new(), &RuntimeConfig::default())
            .unwrap();
        let root = *mount.root();
        assert!(!mount.input(&root, "x").unwrap());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let store = observe(json!({}));
        let config = RuntimeConfig {
            delimiters: crate::config::Delimiters::new("", "}}"),
            ..RuntimeConfig::default()
        };
        let result = Mount::new(&greeting(), &store, MemoryTree::new(), &config);
        assert!(matches!(result, Err(MountError::Config(_))));
    }

    #[test]
    fn dropping_the_mount_releases_subscribers() {
        let store = observe(json!({ "user": { "name": "Ann" }, "theme": "dark" }));
        let mount = Mount::new(&greeting(), &store, MemoryTree::new(), &RuntimeConfig::default())
            .unwrap();
        assert_eq!(store.dependents("user.name").len(), 1);

        drop(mount);
        assert!(store.dependents("user.name").is_empty());
        assert_eq!(store.runtime().subscriber_count(), 0);
    }
}
