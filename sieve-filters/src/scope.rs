//! Per-request resolution.
//!
//! A [`Scope`] borrows the shared [`FilterSet`] and holds everything that
//! belongs to one request: the raw parameters, the request context and the
//! per-request copies of value fields. The compiled tree itself is never
//! mutated, so scopes for concurrent requests need no coordination.
//!
//! The pipeline run by [`Scope::filter_queryset`]:
//!
//! 1. resolve every non-namespace node into an [`Entry`] or an error
//! 2. check constraints against all parsed values
//! 3. report parameters that no filter or known parameter accounts for
//! 4. fail with every error at once, or
//! 5. apply the default-group entries one by one, then each named group
//!    combined into a single condition

use std::cell::RefCell;
use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use sieve_query::{Collection, Expr, FilterValue};
use tracing::{debug, trace};

use crate::entry::{Entries, Entry, EntryValue, Groups, ParamValue, Values};
use crate::error::{
    EntryError, ErrorMap, FilterResult, ResolutionError, ValidationError, merge_errors,
};
use crate::field::{CharField, Validated, ValueField};
use crate::filter::{CHAIN, Target};
use crate::filterset::{FilterSet, MethodOutput, NodeId, ResolvedOptions};
use crate::hooks::{FieldLookup, Hooks};
use crate::params::{QueryParams, RequestContext};
use crate::settings::Blank;

/// Outcome of resolving one subtree: entries (`None` when the parameter was
/// not provided) and validation errors, both keyed by dotted name.
pub type Resolved = (IndexMap<String, Option<Entry>>, IndexMap<String, ValidationError>);

/// Resolution state of one request.
pub struct Scope<'a, H: Hooks> {
    filterset: &'a FilterSet<H>,
    params: &'a QueryParams,
    context: RequestContext,
    fields: RefCell<HashMap<NodeId, Box<dyn ValueField>>>,
}

impl<'a, H: Hooks> Scope<'a, H> {
    pub(crate) fn new(
        filterset: &'a FilterSet<H>,
        params: &'a QueryParams,
        context: RequestContext,
    ) -> Self {
        Self {
            filterset,
            params,
            context,
            fields: RefCell::new(HashMap::new()),
        }
    }

    /// The filter set being resolved.
    pub fn filterset(&self) -> &'a FilterSet<H> {
        self.filterset
    }

    /// Raw request parameters.
    pub fn params(&self) -> &'a QueryParams {
        self.params
    }

    /// Request context.
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Options of the filter set.
    pub fn options(&self) -> &'a ResolvedOptions {
        self.filterset.options()
    }

    /// Hooks of the filter set.
    pub fn hooks(&self) -> &'a H {
        self.filterset.hooks()
    }

    /// The field `param` was validated with in this request.
    pub fn resolved_field(&self, param: &str) -> Option<Box<dyn ValueField>> {
        let node = self.filterset.find(param)?;
        self.fields.borrow().get(&node.id()).cloned()
    }

    /// Per-request copy of the value field for `id`.
    ///
    /// The declared field (own or inherited) is offered to
    /// [`Hooks::value_field`], which may keep or replace it. The copy gets the
    /// dynamic default, the field context and the node's `required` flag.
    pub fn resolve_value_field(&self, id: NodeId) -> Result<Box<dyn ValueField>, ResolutionError> {
        let node = self.filterset.node(id);
        let param = node.dotted_name();
        let declared = self.filterset.declared_field(id);

        let mut field = match (self.hooks().value_field(self, param, declared), declared) {
            (FieldLookup::Replaced(field), _) => field,
            (FieldLookup::Declared, Some(declared)) => declared.clone_box(),
            (FieldLookup::Declared, None) | (FieldLookup::Unresolved, _) => {
                return Err(ResolutionError::UnresolvedField {
                    param: param.to_string(),
                });
            }
        };

        let default = field.options().default.clone();
        let default = self.hooks().default_value(self, param, default);
        let context = self.hooks().field_context(self, param);
        let options = field.options_mut();
        options.default = default;
        options.context = Some(context);
        options.required = node.is_required();
        Ok(field)
    }

    /// Parse the raw value of `id`.
    ///
    /// A present value is first trimmed and checked for NUL characters; an
    /// empty result counts as missing under [`Blank::Omit`].
    pub fn parse_value(&self, id: NodeId, raw: Option<&str>) -> Result<Validated, EntryError> {
        let node = self.filterset.node(id);
        let cleaned = match raw {
            Some(raw) => {
                let cleaned = CharField::new().allow_blank().clean(raw)?;
                (!(cleaned.is_empty() && node.blank() == Blank::Omit)).then_some(cleaned)
            }
            None => None,
        };

        let field = self.resolve_value_field(id)?;
        let result =
            self.hooks()
                .run_validation(self, node.dotted_name(), field.as_ref(), cleaned.as_deref());
        self.fields.borrow_mut().insert(id, field);
        Ok(result?)
    }

    /// Build the entry for a parsed value from the node's template or its
    /// target and lookup.
    ///
    /// A computed target is registered as the alias
    /// `_default_alias_<dotted name>` and the condition refers to the alias.
    pub fn resolve_entry_attrs(
        &self,
        id: NodeId,
        value: FilterValue,
    ) -> Result<Entry, ResolutionError> {
        let node = self.filterset.node(id);
        let mut aliases = node.aliases.clone();

        let expression = match node.template() {
            Some(template) => {
                let template = if node.is_negated() {
                    Expr::negate(template.clone())
                } else {
                    template.clone()
                };
                template
                    .fill(&value)
                    .map_err(|source| ResolutionError::Template {
                        param: node.dotted_name().to_string(),
                        source,
                    })?
            }
            None => {
                let lhs = match node.target() {
                    Target::Name(name) => name.clone(),
                    Target::Computed(computed) => {
                        let alias = format!("_default_alias_{}", node.dotted_name());
                        aliases
                            .get_or_insert_with(IndexMap::new)
                            .insert(alias.clone(), computed.clone());
                        alias
                    }
                };
                let condition = Expr::lookup(&lhs, node.lookup(), value.clone());
                if node.is_negated() {
                    Expr::negate(condition)
                } else {
                    condition
                }
            }
        };

        Ok(Entry {
            group: node.group().to_string(),
            aliases,
            value: EntryValue::Single(value),
            expression: Some(expression),
        })
    }

    /// Resolve one node. `Ok(None)` means the parameter was not provided.
    pub fn resolve_entry(&self, id: NodeId) -> Result<Option<Entry>, EntryError> {
        let node = self.filterset.node(id);
        let value = match self.parse_value(id, node.raw_value(self.params))? {
            Validated::Value(value) => value,
            Validated::Absent => return Ok(None),
        };

        if node.is_noop() {
            return Ok(Some(Entry::noop(node.group(), value)));
        }

        if let Some(method) = node.method() {
            let callback =
                self.filterset
                    .method(method)
                    .ok_or_else(|| ResolutionError::UnknownMethod {
                        method: method.to_string(),
                        param: node.dotted_name().to_string(),
                    })?;
            let entry = match callback(self, node.dotted_name(), &value)? {
                MethodOutput::Entry(entry) => entry,
                MethodOutput::Expr(expr) => Entry::new(node.group(), value, expr),
                MethodOutput::Noop => Entry::noop(node.group(), value),
            };
            return Ok(Some(entry));
        }

        Ok(Some(self.resolve_entry_attrs(id, value)?))
    }

    /// Resolve `id` and its descendants, skipping namespaces.
    ///
    /// Validation errors are collected; a resolution error stops the walk.
    pub fn resolve(&self, id: NodeId) -> Result<Resolved, ResolutionError> {
        let mut entries = IndexMap::new();
        let mut errors = IndexMap::new();
        for id in self.filterset.subtree(id) {
            let node = self.filterset.node(id);
            if node.is_namespace() {
                continue;
            }
            let param = node.dotted_name().to_string();
            match self.resolve_entry(id) {
                Ok(entry) => {
                    trace!(param = %param, provided = entry.is_some(), "Resolved parameter");
                    entries.insert(param, entry);
                }
                Err(EntryError::Validation(err)) => {
                    debug!(param = %param, error = %err, "Parameter failed validation");
                    errors.insert(param, err);
                }
                Err(EntryError::Resolution(err)) => return Err(err),
            }
        }
        Ok((entries, errors))
    }

    /// Resolve every filter, check constraints and unknown parameters.
    ///
    /// Returns the entries partitioned by group and the values of every
    /// provided parameter, or the aggregated failure.
    pub fn get_groups(&self) -> FilterResult<(Groups, Values)> {
        let mut known: IndexSet<String> =
            self.hooks().known_parameters(self).into_iter().collect();
        let mut groups = Groups::new();
        let mut values = Values::new();
        let mut errors = ErrorMap::new();

        for &root in self.filterset.roots() {
            let (entries, failures) = self.resolve(root)?;
            known.extend(entries.keys().cloned());
            known.extend(failures.keys().cloned());

            for (param, entry) in entries {
                if let Some(entry) = entry {
                    values.insert(param.clone(), ParamValue::Valid(entry.value.clone()));
                    groups
                        .entry(entry.group.clone())
                        .or_default()
                        .insert(param, entry);
                }
            }
            for (param, err) in failures {
                merge_errors(&mut errors, err.into_param_map(&param));
                values.insert(param, ParamValue::Invalid);
            }
        }

        merge_errors(&mut errors, self.handle_constraints(&values)?);

        if self.options().handle_unknown_parameters {
            let unknown: Vec<String> = self
                .params
                .keys()
                .filter(|key| !known.contains(*key))
                .map(String::from)
                .collect();
            if !unknown.is_empty() {
                let known: Vec<String> = known.into_iter().collect();
                merge_errors(
                    &mut errors,
                    self.hooks().unknown_parameters(self, &unknown, &known),
                );
            }
        }

        if !errors.is_empty() {
            debug!(
                filterset = %self.filterset.name(),
                keys = errors.len(),
                "Rejecting request"
            );
            return Err(self.hooks().handle_errors(self, errors));
        }

        Ok((groups, values))
    }

    /// Run every constraint, filing plain messages under the non-field key.
    ///
    /// Constraints supplied by the hook are not seen at build time, so their
    /// methods are checked here; a missing one fails the request outright.
    pub fn handle_constraints(&self, values: &Values) -> FilterResult<ErrorMap> {
        let mut errors = ErrorMap::new();
        for constraint in self.hooks().constraints(self) {
            for method in constraint.required_methods() {
                if self.filterset.constraint_method(method).is_none() {
                    return Err(ResolutionError::UnknownMethod {
                        method: method.to_string(),
                        param: constraint.name().to_string(),
                    }
                    .into());
                }
            }
            if let Err(err) = constraint.check(self, values) {
                trace!(constraint = constraint.name(), "Constraint failed");
                merge_errors(&mut errors, err.into_map(&self.options().non_field_errors_key));
            }
        }
        Ok(errors)
    }

    /// Call a registered constraint method.
    pub fn call_constraint_method(&self, name: &str, values: &Values) -> Result<(), ValidationError> {
        match self.filterset.constraint_method(name) {
            Some(callback) => callback(self, values),
            None => Err(ValidationError::invalid(format!(
                "Constraint method `{}` is not registered.",
                name
            ))),
        }
    }

    /// Merge the entries of one group into a single entry.
    ///
    /// Expressions are reduced left to right with the group's combinator;
    /// entries without an expression are skipped. Aliases are unioned, later
    /// names winning.
    pub fn get_group_entry(&self, group: &str, entries: &Entries) -> Entry {
        let combinator = self.hooks().combinator(self, group, entries);
        let expression = entries
            .values()
            .filter_map(|entry| entry.expression.clone())
            .reduce(|left, right| combinator.apply(left, right));

        let mut aliases = IndexMap::new();
        for entry in entries.values() {
            if let Some(entry_aliases) = &entry.aliases {
                aliases.extend(entry_aliases.clone());
            }
        }

        trace!(group = %group, members = entries.len(), "Combined group");
        Entry {
            group: group.to_string(),
            aliases: (!aliases.is_empty()).then_some(aliases),
            value: EntryValue::Group(
                entries
                    .iter()
                    .map(|(name, entry)| (name.clone(), entry.value.clone()))
                    .collect(),
            ),
            expression,
        }
    }

    /// Combine every group under the dotted prefix `root`.
    ///
    /// A group named exactly `root` is merged directly. Deeper groups are
    /// merged recursively per next segment (`root.x`, `root.y`, ...). The
    /// results are then merged under the meta group `@root`, unless there is
    /// only one, which is returned as is.
    pub fn resolve_namespace(&self, root: &str, groups: &Groups) -> Entry {
        let prefix = format!("{}.", root);
        let mut children = Entries::new();
        let mut namespaces = IndexSet::new();

        for (name, entries) in groups {
            if name == root {
                children.insert(name.clone(), self.get_group_entry(name, entries));
            } else if let Some(rest) = name.strip_prefix(&prefix) {
                let next = rest.split('.').next().unwrap_or(rest);
                namespaces.insert(format!("{}{}", prefix, next));
            }
        }
        for namespace in namespaces {
            let entry = self.resolve_namespace(&namespace, groups);
            children.insert(namespace, entry);
        }

        if children.len() == 1 {
            if let Some((_, entry)) = children.pop() {
                return entry;
            }
        }
        self.get_group_entry(&format!("@{}", root), &children)
    }

    /// Run the whole pipeline against `collection`.
    pub fn filter_queryset<C: Collection>(&self, collection: C) -> FilterResult<C> {
        let (mut groups, values) = self.get_groups()?;
        let mut collection = collection;

        if let Some(chain) = groups.shift_remove(CHAIN) {
            for entry in chain.values() {
                collection = entry.apply(collection);
            }
        }

        let mut namespaces: IndexMap<String, Groups> = IndexMap::new();
        for (name, entries) in groups {
            let root = name.split('.').next().unwrap_or(&name).to_string();
            namespaces.entry(root).or_default().insert(name, entries);
        }
        for (root, sub) in &namespaces {
            let entry = match sub.first() {
                Some((name, entries)) if sub.len() == 1 => self.get_group_entry(name, entries),
                _ => self.resolve_namespace(root, sub),
            };
            collection = entry.apply(collection);
        }

        debug!(
            filterset = %self.filterset.name(),
            values = values.len(),
            "Filtered collection"
        );
        Ok(self.hooks().finalize(self, collection, &values))
    }
}
