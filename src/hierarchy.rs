//! Post-processing passes over a read object tree.
//!
//! - [`propagate_attributes`] copies list attributes down to the leaves
//! - [`flatten_hierarchy`] turns nested lists into a flat sequence of leaves
//! - [`resolve_instances`] replaces instances by transformed copies
//! - [`eliminate_degenerate_list`] unwraps single-element lists

use crate::binary::LeafHook;
use crate::object::*;
use crate::util::{Error, Result};

/// Nesting bound for instances of instances. Deeper chains are cut with a
/// warning.
pub const MAX_INSTANCE_DEPTH: usize = 32;

/// Bound on the number of copies one resolution pass may create.
pub const MAX_INSTANCE_COPIES: usize = 1 << 20;

// ============================================================================
// Attribute propagation
// ============================================================================

/// Copy the attributes of every list down to the leaves below it.
///
/// A leaf keeps its own value for an attribute it already has. `invisible`
/// never propagates. `animation` accumulates instead: a leaf ends up with the
/// animation objects of its ancestors, outermost first, followed by its own.
/// With `name` given only that attribute is propagated.
///
/// Running the pass twice gives the same leaves as running it once.
pub fn propagate_attributes(obj: &mut Object, name: Option<&str>) {
    propagate(obj, &Attributes::new(), name);
}

fn propagate(obj: &mut Object, inherited: &Attributes, name: Option<&str>) {
    let wanted = |attr: &str| {
        !attr.eq_ignore_ascii_case(ATTR_INVISIBLE) && name.map_or(true, |n| attr.eq_ignore_ascii_case(n))
    };

    if let ObjectKind::List(children) = &mut obj.kind {
        // Closer lists override farther ones, animation accumulates
        let mut scope = inherited.clone();
        for attr in obj.attrs.iter().filter(|a| wanted(&a.name)) {
            let value = if attr.name.eq_ignore_ascii_case(ATTR_ANIMATION) {
                match scope.get(ATTR_ANIMATION) {
                    Some(outer) => accumulate_animation(outer, Some(&attr.value)),
                    None => attr.value.clone(),
                }
            } else {
                attr.value.clone()
            };
            scope.set(attr.name.clone(), value);
        }
        for child in children.iter_mut() {
            propagate(child, &scope, name);
        }
        return;
    }

    for attr in inherited.iter().filter(|a| wanted(&a.name)) {
        if attr.name.eq_ignore_ascii_case(ATTR_ANIMATION) {
            let merged = accumulate_animation(&attr.value, obj.attrs.get(ATTR_ANIMATION));
            obj.attrs.set(ATTR_ANIMATION, merged);
        } else if !obj.attrs.contains(&attr.name) {
            obj.attrs.set(attr.name.clone(), attr.value.clone());
        }
    }
}

/// Animation objects carried by an attribute value: the children of a list,
/// or the object itself.
fn animation_objects(value: &AttrValue) -> Option<Vec<Object>> {
    match value {
        AttrValue::Object(o) => Some(match &o.kind {
            ObjectKind::List(children) => children.clone(),
            _ => vec![(**o).clone()],
        }),
        _ => None,
    }
}

/// Prefix the outer animation to the inner one. An inner value that already
/// starts with the outer objects is returned unchanged.
fn accumulate_animation(outer: &AttrValue, inner: Option<&AttrValue>) -> AttrValue {
    let Some(inner) = inner else {
        return outer.clone();
    };
    let (Some(mut chain), Some(own)) = (animation_objects(outer), animation_objects(inner)) else {
        // Not object valued, the leaf wins
        return inner.clone();
    };
    if own.starts_with(&chain) {
        return inner.clone();
    }
    chain.extend(own);
    AttrValue::Object(Box::new(Object::list(chain)))
}

// ============================================================================
// Flattening
// ============================================================================

/// Whether the object carries a non-zero `invisible` attribute.
pub fn is_invisible(obj: &Object) -> bool {
    match obj.attrs.get(ATTR_INVISIBLE) {
        Some(AttrValue::Int(0)) | None => false,
        Some(_) => true,
    }
}

/// Collect the leaves of a tree in document order.
///
/// Invisible subtrees are dropped unless `flatten_invisible` is set. The hook,
/// if any, sees each leaf once and may replace or drop it.
pub fn flatten_hierarchy(root: Object, flatten_invisible: bool, mut hook: Option<&mut LeafHook<'_>>) -> Vec<Object> {
    let mut out = Vec::new();
    flatten_into(root, flatten_invisible, &mut hook, &mut out);
    out
}

fn flatten_into(obj: Object, flatten_invisible: bool, hook: &mut Option<&mut LeafHook<'_>>, out: &mut Vec<Object>) {
    if !flatten_invisible && is_invisible(&obj) {
        tracing::trace!("skipping invisible {:?}", obj.name());
        return;
    }
    match obj.kind {
        ObjectKind::List(children) => {
            for child in children {
                flatten_into(child, flatten_invisible, hook, out);
            }
        }
        kind => {
            let leaf = Object { kind, ..obj };
            match hook.as_deref_mut() {
                Some(h) => out.extend(h(leaf)),
                None => out.push(leaf),
            }
        }
    }
}

// ============================================================================
// Instances
// ============================================================================

/// Replace every instance by a copy of the object it names, transformed by
/// the instance matrix.
///
/// Targets are looked up by exact name anywhere in the tree as it was before
/// resolution. The copy takes the instance's name and attributes over its
/// own, loses `invisible` (hidden prototypes still show through their
/// instances) and is tagged with [`ATTR_INSTANCE`]. Instances inside the copy
/// are resolved in turn.
///
/// A missing target is a warning and the instance is dropped, or an
/// [`Error::UnknownInstance`] when `strict`. The same holds for an instance
/// of an object it is being expanded into (a cycle), for chains deeper than
/// [`MAX_INSTANCE_DEPTH`] and for copies beyond [`MAX_INSTANCE_COPIES`],
/// which fail with a semantic error when `strict`.
pub fn resolve_instances(root: Object, strict: bool) -> Result<Object> {
    let library = root.clone();
    let mut resolver = Resolver { library: &library, strict, path: Vec::new(), copies: 0 };
    Ok(resolver.resolve(root)?.unwrap_or_else(|| Object::list(Vec::new())))
}

fn lookup<'a>(obj: &'a Object, name: &str) -> Option<&'a Object> {
    if obj.name.as_deref() == Some(name) && !matches!(obj.kind, ObjectKind::Instance(_)) {
        return Some(obj);
    }
    obj.children().iter().find_map(|c| lookup(c, name))
}

struct Resolver<'a> {
    library: &'a Object,
    strict: bool,
    /// Targets currently being expanded, outermost first.
    path: Vec<String>,
    copies: usize,
}

impl Resolver<'_> {
    /// Drop an instance with a warning, or fail when strict.
    fn skip(&self, msg: String) -> Result<Option<Object>> {
        if self.strict {
            return Err(Error::invalid(msg));
        }
        tracing::warn!("{msg}, dropped");
        Ok(None)
    }

    fn resolve(&mut self, obj: Object) -> Result<Option<Object>> {
        let Object { name, attrs, kind } = obj;
        match kind {
            ObjectKind::List(children) => {
                let mut resolved = Vec::with_capacity(children.len());
                for child in children {
                    resolved.extend(self.resolve(child)?);
                }
                Ok(Some(Object { name, attrs, kind: ObjectKind::List(resolved) }))
            }
            ObjectKind::Instance(inst) => {
                if self.path.contains(&inst.target) {
                    return self.skip(format!("instance of {:?} inside its own expansion", inst.target));
                }
                if self.path.len() >= MAX_INSTANCE_DEPTH {
                    return self.skip(format!("instance nesting deeper than {MAX_INSTANCE_DEPTH} at {:?}", inst.target));
                }
                if self.copies >= MAX_INSTANCE_COPIES {
                    return self.skip(format!("more than {MAX_INSTANCE_COPIES} instance copies at {:?}", inst.target));
                }
                let Some(target) = lookup(self.library, &inst.target) else {
                    if self.strict {
                        return Err(Error::UnknownInstance(inst.target));
                    }
                    tracing::warn!("instance target {:?} not found, dropped", inst.target);
                    return Ok(None);
                };
                self.copies += 1;

                let mut copy = target.clone();
                copy.transform(&inst.mat);
                if name.is_some() {
                    copy.name = name;
                }
                for attr in attrs.iter() {
                    copy.attrs.set(attr.name.clone(), attr.value.clone());
                }
                copy.attrs.remove(ATTR_INVISIBLE);
                copy.attrs.set(ATTR_INSTANCE, inst.target.clone());

                self.path.push(inst.target);
                let resolved = self.resolve(copy);
                self.path.pop();
                resolved
            }
            kind => Ok(Some(Object { name, attrs, kind })),
        }
    }
}

// ============================================================================
// Degenerate lists
// ============================================================================

/// An empty list is an empty file; a list of one object is that object.
/// Anything else is returned as is.
pub fn eliminate_degenerate_list(obj: Object) -> Result<Object> {
    match obj.kind {
        ObjectKind::List(children) if children.is_empty() => Err(Error::EmptyFile),
        ObjectKind::List(mut children) if children.len() == 1 => {
            children.pop().ok_or(Error::EmptyFile)
        }
        kind => Ok(Object { kind, ..obj }),
    }
}
