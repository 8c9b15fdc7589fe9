//! Filter sets: compiled, immutable trees of filter declarations.
//!
//! [`FilterSetBuilder::build`] is the compile step. It checks every
//! declaration, applies the `fields` allow-list and lays the tree out in an
//! arena in depth-first pre-order, so that each subtree occupies a contiguous
//! range of [`NodeId`]s. Names, groups, targets and inherited flags are
//! resolved once here; requests only read them.
//!
//! ```rust
//! use sieve_filters::{Combinator, Filter, FilterSet, QueryParams, RequestContext};
//! use sieve_filters::field::CharField;
//! use sieve_query::{Collection, QuerySet};
//!
//! let filterset = FilterSet::builder("UserFilterSet")
//!     .filter("username", Filter::of(CharField::new()))
//!     .filter("first_name", Filter::of(CharField::new()).group("names"))
//!     .filter("last_name", Filter::of(CharField::new()).group("names"))
//!     .combinator("names", Combinator::Or)
//!     .build()
//!     .unwrap();
//!
//! let params = QueryParams::parse("username=kate&first_name=kate&last_name=kate");
//! let qs = filterset
//!     .filter_queryset(&params, RequestContext::new(), QuerySet::new("users"))
//!     .unwrap();
//! assert_eq!(qs.filters().len(), 2);
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use sieve_query::{Collection, Computed, Expr, FilterValue};
use tracing::debug;

use crate::constraints::Constraint;
use crate::entry::{Entry, Values};
use crate::error::{ConstructionError, FilterResult, ValidationError};
use crate::field::ValueField;
use crate::filter::{Filter, Target, validate_group};
use crate::hooks::{DefaultHooks, Hooks};
use crate::params::{QueryParams, RequestContext};
use crate::scope::Scope;
use crate::settings::{Blank, Settings};

/// Operator reducing a group's expressions left to right.
#[derive(Clone, Default)]
pub enum Combinator {
    /// Logical AND.
    #[default]
    And,
    /// Logical OR.
    Or,
    /// Any binary operator.
    Custom(Arc<dyn Fn(Expr, Expr) -> Expr + Send + Sync>),
}

impl Combinator {
    /// Wrap a binary operator.
    pub fn custom(f: impl Fn(Expr, Expr) -> Expr + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Combine two expressions.
    pub fn apply(&self, left: Expr, right: Expr) -> Expr {
        match self {
            Self::And => left.and_then(right),
            Self::Or => left.or_else(right),
            Self::Custom(f) => f(left, right),
        }
    }
}

impl fmt::Debug for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "And"),
            Self::Or => write!(f, "Or"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// What a filter method produced.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodOutput {
    /// Full control over group, aliases and expression.
    Entry(Entry),
    /// An expression, placed in the filter's own group.
    Expr(Expr),
    /// No expression; the value is still visible to constraints.
    Noop,
}

impl From<Expr> for MethodOutput {
    fn from(expr: Expr) -> Self {
        Self::Expr(expr)
    }
}

impl From<Entry> for MethodOutput {
    fn from(entry: Entry) -> Self {
        Self::Entry(entry)
    }
}

/// Callback behind [`Filter::method`].
pub type MethodFn<H> = Arc<
    dyn Fn(&Scope<'_, H>, &str, &FilterValue) -> Result<MethodOutput, ValidationError>
        + Send
        + Sync,
>;

/// Callback behind [`MethodConstraint`](crate::constraints::MethodConstraint).
pub type ConstraintMethodFn<H> =
    Arc<dyn Fn(&Scope<'_, H>, &Values) -> Result<(), ValidationError> + Send + Sync>;

/// Options of one filter set, each falling back to [`Settings`] when unset.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Dotted names to keep; everything else is pruned.
    pub fields: Option<Vec<String>>,
    /// Replaces the known parameters from the settings.
    pub known_parameters: Option<Vec<String>>,
    /// Added to the known parameters.
    pub extend_known_parameters: Vec<String>,
    /// Whether unknown parameters are rejected.
    pub handle_unknown_parameters: Option<bool>,
    /// Combinator per group name.
    pub combinators: IndexMap<String, Combinator>,
    /// Blank policy for filters that do not set one.
    pub blank: Option<Blank>,
    /// Group of filters that do not declare one.
    pub default_group: Option<String>,
    /// Key collecting errors not tied to a parameter.
    pub non_field_errors_key: Option<String>,
}

impl Options {
    fn resolve(self, settings: &Settings) -> ResolvedOptions {
        let mut known_parameters = self
            .known_parameters
            .unwrap_or_else(|| settings.known_parameters.clone());
        known_parameters.extend(self.extend_known_parameters);

        ResolvedOptions {
            known_parameters,
            handle_unknown_parameters: self
                .handle_unknown_parameters
                .unwrap_or(settings.handle_unknown_parameters),
            combinators: self.combinators,
            blank: self.blank.unwrap_or(settings.blank),
            default_group: self
                .default_group
                .unwrap_or_else(|| settings.default_group.clone()),
            non_field_errors_key: self
                .non_field_errors_key
                .unwrap_or_else(|| settings.non_field_errors_key.clone()),
        }
    }
}

/// Options after falling back to the settings.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    /// Parameters never reported as unknown.
    pub known_parameters: Vec<String>,
    /// Whether unknown parameters are rejected.
    pub handle_unknown_parameters: bool,
    /// Combinator per group name.
    pub combinators: IndexMap<String, Combinator>,
    /// Blank policy for filters that do not set one.
    pub blank: Blank,
    /// Group of filters that do not declare one.
    pub default_group: String,
    /// Key collecting errors not tied to a parameter.
    pub non_field_errors_key: String,
}

/// Index of a node in a compiled filter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position in [`FilterSet::nodes`].
    pub fn index(self) -> usize {
        self.0
    }
}

/// One compiled filter.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Exclusive end of this node's subtree in the arena.
    pub(crate) end: usize,
    pub(crate) name: String,
    pub(crate) dotted: String,
    pub(crate) group: String,
    pub(crate) target: Target,
    pub(crate) lookup: String,
    pub(crate) template: Option<Expr>,
    pub(crate) negate: bool,
    pub(crate) method: Option<String>,
    pub(crate) aliases: Option<IndexMap<String, Computed>>,
    pub(crate) field: Option<Box<dyn ValueField>>,
    pub(crate) field_owner: Option<NodeId>,
    pub(crate) namespace: bool,
    pub(crate) blank: Blank,
    pub(crate) noop: bool,
    pub(crate) required: bool,
}

impl Node {
    /// Arena index.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Parent node.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Direct children in declaration order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Own parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Query string key: the parent's dotted name, a dot, and the own name.
    pub fn dotted_name(&self) -> &str {
        &self.dotted
    }

    /// Own group, else the nearest ancestor's, else the default group.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Own target, else the nearest ancestor's, else the declared root name.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Lookup suffix.
    pub fn lookup(&self) -> &str {
        &self.lookup
    }

    /// Template expression, if any.
    pub fn template(&self) -> Option<&Expr> {
        self.template.as_ref()
    }

    /// Method key, if any.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Whether the expression is negated.
    pub fn is_negated(&self) -> bool {
        self.negate
    }

    /// Whether only the children are exposed.
    pub fn is_namespace(&self) -> bool {
        self.namespace
    }

    /// Whether the value is validated but contributes no expression.
    pub fn is_noop(&self) -> bool {
        self.noop
    }

    /// Own `required`, else the nearest ancestor's, else `false`.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Own blank policy, else the filter set's.
    pub fn blank(&self) -> Blank {
        self.blank
    }

    /// Raw value of this parameter, if supplied.
    pub fn raw_value<'p>(&self, params: &'p QueryParams) -> Option<&'p str> {
        params.get(&self.dotted)
    }
}

/// A compiled filter set, shared by every request.
pub struct FilterSet<H: Hooks = DefaultHooks> {
    name: String,
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    options: ResolvedOptions,
    constraints: Vec<Arc<dyn Constraint<H>>>,
    methods: IndexMap<String, MethodFn<H>>,
    constraint_methods: IndexMap<String, ConstraintMethodFn<H>>,
    hooks: H,
}

impl<H: Hooks> fmt::Debug for FilterSet<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSet")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots)
            .field("options", &self.options)
            .field("constraints", &self.constraints)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FilterSet<DefaultHooks> {
    /// Start declaring a filter set with default hooks.
    pub fn builder(name: impl Into<String>) -> FilterSetBuilder<DefaultHooks> {
        FilterSetBuilder::new(name, DefaultHooks)
    }
}

impl<H: Hooks> FilterSet<H> {
    /// Start declaring a filter set with custom hooks.
    pub fn with_hooks(name: impl Into<String>, hooks: H) -> FilterSetBuilder<H> {
        FilterSetBuilder::new(name, hooks)
    }

    /// Name given to the builder.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every node, in depth-first pre-order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// A node by id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Top-level filters in declaration order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Ids of `id` and all its descendants, in pre-order.
    pub fn subtree(&self, id: NodeId) -> impl Iterator<Item = NodeId> + use<H> {
        (id.0..self.nodes[id.0].end).map(NodeId)
    }

    /// Find a node by its dotted name.
    pub fn find(&self, dotted: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.dotted == dotted)
    }

    /// Field declared on the node or its nearest ancestor.
    pub fn declared_field(&self, id: NodeId) -> Option<&dyn ValueField> {
        let owner = self.nodes[id.0].field_owner?;
        self.nodes[owner.0].field.as_deref()
    }

    /// Options after falling back to the settings.
    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    /// Declared constraints.
    pub fn constraints(&self) -> &[Arc<dyn Constraint<H>>] {
        &self.constraints
    }

    /// Hooks.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub(crate) fn method(&self, name: &str) -> Option<&MethodFn<H>> {
        self.methods.get(name)
    }

    pub(crate) fn constraint_method(&self, name: &str) -> Option<&ConstraintMethodFn<H>> {
        self.constraint_methods.get(name)
    }

    /// Start resolving one request.
    pub fn scope<'a>(&'a self, params: &'a QueryParams, context: RequestContext) -> Scope<'a, H> {
        Scope::new(self, params, context)
    }

    /// Resolve `params` and apply the result to `collection`.
    pub fn filter_queryset<C: Collection>(
        &self,
        params: &QueryParams,
        context: RequestContext,
        collection: C,
    ) -> FilterResult<C> {
        self.scope(params, context).filter_queryset(collection)
    }
}

/// Collects declarations and options, then compiles them.
pub struct FilterSetBuilder<H: Hooks = DefaultHooks> {
    name: String,
    filters: Vec<(String, Filter)>,
    options: Options,
    constraints: Vec<Arc<dyn Constraint<H>>>,
    methods: IndexMap<String, MethodFn<H>>,
    constraint_methods: IndexMap<String, ConstraintMethodFn<H>>,
    settings: Option<Settings>,
    hooks: H,
}

impl<H: Hooks> FilterSetBuilder<H> {
    /// Create a builder.
    pub fn new(name: impl Into<String>, hooks: H) -> Self {
        Self {
            name: name.into(),
            filters: Vec::new(),
            options: Options::default(),
            constraints: Vec::new(),
            methods: IndexMap::new(),
            constraint_methods: IndexMap::new(),
            settings: None,
            hooks,
        }
    }

    /// Declare a top-level filter under `name`.
    pub fn filter(mut self, name: impl Into<String>, filter: Filter) -> Self {
        self.filters.push((name.into(), filter));
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Keep only these dotted names.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the known parameters.
    pub fn known_parameters<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.known_parameters = Some(params.into_iter().map(Into::into).collect());
        self
    }

    /// Add to the known parameters.
    pub fn extend_known_parameters<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options
            .extend_known_parameters
            .extend(params.into_iter().map(Into::into));
        self
    }

    /// Whether unknown parameters are rejected.
    pub fn handle_unknown_parameters(mut self, enabled: bool) -> Self {
        self.options.handle_unknown_parameters = Some(enabled);
        self
    }

    /// Combinator for `group`.
    pub fn combinator(mut self, group: impl Into<String>, combinator: Combinator) -> Self {
        self.options.combinators.insert(group.into(), combinator);
        self
    }

    /// Blank policy for filters that do not set one.
    pub fn blank(mut self, blank: Blank) -> Self {
        self.options.blank = Some(blank);
        self
    }

    /// Group of filters that do not declare one.
    pub fn default_group(mut self, group: impl Into<String>) -> Self {
        self.options.default_group = Some(group.into());
        self
    }

    /// Key collecting errors not tied to a parameter.
    pub fn non_field_errors_key(mut self, key: impl Into<String>) -> Self {
        self.options.non_field_errors_key = Some(key.into());
        self
    }

    /// Settings to fall back to instead of [`Settings::global`].
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Add a constraint.
    pub fn constraint(mut self, constraint: impl Constraint<H> + 'static) -> Self {
        self.constraints.push(Arc::new(constraint));
        self
    }

    /// Register a method used by [`Filter::method`].
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Scope<'_, H>, &str, &FilterValue) -> Result<MethodOutput, ValidationError>
            + Send
            + Sync
            + 'static,
    {
        self.methods.insert(name.into(), Arc::new(f));
        self
    }

    /// Register a method used by a method constraint.
    pub fn constraint_method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Scope<'_, H>, &Values) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.constraint_methods.insert(name.into(), Arc::new(f));
        self
    }

    /// Check the declarations and compile them.
    pub fn build(self) -> Result<FilterSet<H>, ConstructionError> {
        let settings = self.settings.unwrap_or_else(|| Settings::global().clone());
        let fields = self.options.fields.clone();
        let options = self.options.resolve(&settings);
        validate_group(&options.default_group)?;

        let mut seen = IndexSet::new();
        for (name, filter) in &self.filters {
            if !seen.insert(name.as_str()) {
                return Err(ConstructionError::DuplicateFilter { name: name.clone() });
            }
            let param = filter.param.clone().unwrap_or_else(|| name.clone());
            check_tree(filter, &param)?;
        }

        let filters = match &fields {
            Some(fields) => prune(self.filters, fields)?,
            None => self.filters,
        };

        let mut compiler = Compiler {
            nodes: Vec::new(),
            options: &options,
        };
        let mut roots = Vec::with_capacity(filters.len());
        for (name, filter) in filters {
            roots.push(compiler.layout(filter, &name, None));
        }
        let nodes = compiler.nodes;

        let mut dotted = IndexSet::with_capacity(nodes.len());
        for node in &nodes {
            if !dotted.insert(node.dotted.as_str()) {
                return Err(ConstructionError::DuplicateFilter {
                    name: node.dotted.clone(),
                });
            }
        }

        for node in &nodes {
            if let Some(method) = &node.method {
                if !self.methods.contains_key(method) {
                    return Err(ConstructionError::UnknownMethod {
                        method: method.clone(),
                        used_by: node.dotted.clone(),
                    });
                }
            }
        }
        for constraint in &self.constraints {
            for method in constraint.required_methods() {
                if !self.constraint_methods.contains_key(method) {
                    return Err(ConstructionError::UnknownMethod {
                        method: method.to_string(),
                        used_by: constraint.name().to_string(),
                    });
                }
            }
        }

        debug!(
            filterset = %self.name,
            nodes = nodes.len(),
            roots = roots.len(),
            constraints = self.constraints.len(),
            "Compiled filter set"
        );

        Ok(FilterSet {
            name: self.name,
            nodes,
            roots,
            options,
            constraints: self.constraints,
            methods: self.methods,
            constraint_methods: self.constraint_methods,
            hooks: self.hooks,
        })
    }
}

/// Check a declaration and all its children.
fn check_tree(filter: &Filter, dotted: &str) -> Result<(), ConstructionError> {
    filter.validate(dotted)?;
    for child in &filter.children {
        let name = child.child_name().ok_or_else(|| ConstructionError::MissingParam {
            parent: dotted.to_string(),
        })?;
        check_tree(child, &format!("{}.{}", dotted, name))?;
    }
    Ok(())
}

/// Apply the `fields` allow-list to the top-level declarations.
fn prune(
    filters: Vec<(String, Filter)>,
    fields: &[String],
) -> Result<Vec<(String, Filter)>, ConstructionError> {
    let mut kept = Vec::new();
    let mut available = Vec::new();
    for (name, filter) in filters {
        let dotted = filter.param.clone().unwrap_or_else(|| name.clone());
        if let Some(filter) = visit(fields, filter, &dotted, &mut available) {
            kept.push((name, filter));
        }
    }

    let unknown: Vec<&String> = fields.iter().filter(|f| !available.contains(f)).collect();
    if !unknown.is_empty() {
        return Err(ConstructionError::UnknownFields {
            fields: quote_list(unknown),
            available: quote_list(available.iter()),
        });
    }
    Ok(kept)
}

fn quote_list<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items
        .into_iter()
        .map(|item| format!("'{}'", item))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Keep listed filters, and unlisted parents of listed children as namespaces.
fn visit(
    fields: &[String],
    mut filter: Filter,
    dotted: &str,
    available: &mut Vec<String>,
) -> Option<Filter> {
    let keep = fields.iter().any(|f| f == dotted);
    if filter.children.is_empty() {
        available.push(dotted.to_string());
        return keep.then_some(filter);
    }

    let mut children = Vec::new();
    for child in std::mem::take(&mut filter.children) {
        let name = child.child_name().unwrap_or_default().to_string();
        if let Some(child) = visit(fields, child, &format!("{}.{}", dotted, name), available) {
            children.push(child);
        }
    }
    available.push(dotted.to_string());

    if !children.is_empty() {
        if !keep {
            filter.namespace = true;
        }
        filter.children = children;
        Some(filter)
    } else if keep {
        Some(filter)
    } else {
        None
    }
}

/// Lays declarations out in the arena, resolving inherited attributes.
struct Compiler<'o> {
    nodes: Vec<Node>,
    options: &'o ResolvedOptions,
}

impl Compiler<'_> {
    fn layout(&mut self, filter: Filter, declared: &str, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent_node = parent.map(|p| &self.nodes[p.0]);

        let name = match parent {
            None => filter.param.clone().unwrap_or_else(|| declared.to_string()),
            Some(_) => filter.child_name().unwrap_or_default().to_string(),
        };
        let dotted = match parent_node {
            Some(p) => format!("{}.{}", p.dotted, name),
            None => name.clone(),
        };
        let group = filter
            .group
            .clone()
            .or_else(|| parent_node.map(|p| p.group.clone()))
            .unwrap_or_else(|| self.options.default_group.clone());
        let target = filter
            .target
            .clone()
            .or_else(|| parent_node.map(|p| p.target.clone()))
            .unwrap_or_else(|| Target::Name(declared.to_string()));
        let required = filter
            .required
            .or_else(|| parent_node.map(|p| p.required))
            .unwrap_or(false);
        let field_owner = if filter.field.is_some() {
            Some(id)
        } else {
            parent_node.and_then(|p| p.field_owner)
        };

        let Filter {
            field,
            lookup,
            template,
            negate,
            method,
            aliases,
            children,
            namespace,
            blank,
            noop,
            ..
        } = filter;

        self.nodes.push(Node {
            id,
            parent,
            children: Vec::new(),
            end: id.0 + 1,
            name,
            dotted,
            group,
            target,
            lookup,
            template,
            negate,
            method,
            aliases,
            field,
            field_owner,
            namespace,
            blank: blank.unwrap_or(self.options.blank),
            noop,
            required,
        });

        for child in children {
            let child_id = self.layout(child, declared, Some(id));
            self.nodes[id.0].children.push(child_id);
        }
        self.nodes[id.0].end = self.nodes.len();
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{CharField, DateField, IntegerField};
    use pretty_assertions::assert_eq;

    fn builder() -> FilterSetBuilder {
        FilterSet::builder("Test").settings(Settings::default())
    }

    fn dotted_names(set: &FilterSet) -> Vec<&str> {
        set.nodes().iter().map(Node::dotted_name).collect()
    }

    fn nested() -> Filter {
        Filter::of(CharField::new()).children([
            Filter::new().lookup("icontains"),
            Filter::new()
                .param("len")
                .target(Computed::length("username"))
                .field(IntegerField::new())
                .children([Filter::new().lookup("gt"), Filter::new().lookup("lt")]),
        ])
    }

    #[test]
    fn test_dotted_names_and_preorder_layout() {
        let set = builder().filter("username", nested()).build().unwrap();
        assert_eq!(
            dotted_names(&set),
            vec![
                "username",
                "username.icontains",
                "username.len",
                "username.len.gt",
                "username.len.lt"
            ]
        );
        let root = set.roots()[0];
        assert_eq!(set.subtree(root).count(), 5);
        let len = set.find("username.len").unwrap().id();
        assert_eq!(
            set.subtree(len).map(|id| set.node(id).dotted_name()).collect::<Vec<_>>(),
            vec!["username.len", "username.len.gt", "username.len.lt"]
        );
        assert_eq!(set.node(len).parent(), Some(root));
    }

    #[test]
    fn test_inheritance() {
        let set = builder()
            .filter(
                "created",
                Filter::of(DateField::new())
                    .group("dates")
                    .required(true)
                    .namespace()
                    .children([Filter::new().lookup("gte").required(false), Filter::new().lookup("lte")]),
            )
            .build()
            .unwrap();

        let gte = set.find("created.gte").unwrap();
        assert_eq!(gte.group(), "dates");
        assert_eq!(gte.target(), &Target::Name("created".into()));
        assert!(!gte.is_required());
        assert!(set.find("created.lte").unwrap().is_required());
        assert!(set.declared_field(gte.id()).is_some());
    }

    #[test]
    fn test_root_param_and_target_fallback() {
        let set = builder()
            .filter("name", Filter::of(CharField::new()).param("full-name"))
            .filter("plain", Filter::new())
            .build()
            .unwrap();

        let node = set.find("full-name").unwrap();
        assert_eq!(node.target(), &Target::Name("name".into()));
        assert_eq!(node.group(), "chain");
        assert!(set.declared_field(set.find("plain").unwrap().id()).is_none());
    }

    #[test]
    fn test_default_group_from_options() {
        let set = builder()
            .default_group("all")
            .filter("a", Filter::of(CharField::new()))
            .build()
            .unwrap();
        assert_eq!(set.find("a").unwrap().group(), "all");
    }

    #[test]
    fn test_child_without_name_is_rejected() {
        let err = builder()
            .filter("username", Filter::of(CharField::new()).child(Filter::new()))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "either `param` or `lookup` needs to be specified for child filters of `username`"
        );
    }

    #[test]
    fn test_duplicate_filter() {
        let err = builder()
            .filter("a", Filter::new())
            .filter("a", Filter::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::DuplicateFilter { .. }));
    }

    #[test]
    fn test_duplicate_dotted_name() {
        // A renamed root landing on another root's parameter
        let err = builder()
            .filter("a", Filter::of(IntegerField::new()))
            .filter("b", Filter::of(IntegerField::new()).param("a"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::DuplicateFilter { ref name } if name == "a"));

        // A named child next to a lookup child with the same segment
        let err = builder()
            .filter(
                "created",
                Filter::of(DateField::new()).children([
                    Filter::new().lookup("gte"),
                    Filter::new().lookup("gt").param("gte"),
                ]),
            )
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "filter `created.gte` is declared more than once"
        );
    }

    #[test]
    fn test_unregistered_method() {
        let err = builder()
            .filter("a", Filter::of(CharField::new()).method("filter_a"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::UnknownMethod { .. }));
    }

    #[test]
    fn test_fields_prunes_tree() {
        let set = builder()
            .filter("username", nested())
            .filter("email", Filter::of(CharField::new()))
            .fields(["username.len.gt", "email"])
            .build()
            .unwrap();

        assert_eq!(
            dotted_names(&set),
            vec!["username", "username.len", "username.len.gt", "email"]
        );
        assert!(set.find("username").unwrap().is_namespace());
        assert!(set.find("username.len").unwrap().is_namespace());
        assert!(!set.find("username.len.gt").unwrap().is_namespace());
    }

    #[test]
    fn test_fields_keeps_parent_without_children() {
        let set = builder()
            .filter("username", nested())
            .fields(["username"])
            .build()
            .unwrap();
        assert_eq!(dotted_names(&set), vec!["username"]);
        assert!(!set.find("username").unwrap().is_namespace());
    }

    #[test]
    fn test_fields_unknown_names() {
        let err = builder()
            .filter("username", Filter::of(CharField::new()).child(Filter::new().lookup("icontains")))
            .fields(["usrname", "username"])
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "the following fields are not valid: 'usrname', available fields: \
             'username.icontains', 'username'"
        );
    }

    #[test]
    fn test_invalid_default_group() {
        let err = builder().default_group("not valid").build().unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidGroup { .. }));
    }

    #[test]
    fn test_combinator_apply() {
        let a = Expr::condition("a", 1);
        let b = Expr::condition("b", 2);
        assert_eq!(Combinator::And.apply(a.clone(), b.clone()), Expr::And(vec![a.clone(), b.clone()]));
        assert_eq!(Combinator::Or.apply(a.clone(), b.clone()), Expr::Or(vec![a.clone(), b.clone()]));
        let xor = Combinator::custom(|l, r| {
            Expr::or([
                Expr::and([l.clone(), Expr::negate(r.clone())]),
                Expr::and([Expr::negate(l), r]),
            ])
        });
        assert!(matches!(xor.apply(a, b), Expr::Or(_)));
    }
}
