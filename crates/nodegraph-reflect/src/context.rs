//! The type context.
//!
//! [`TypeContext`] owns every descriptor the reflection layer hands out, the
//! graphs they are built from and the host type registry. Descriptors live in
//! an append-only table, so a [`TypeHandle`] stays valid for the lifetime of
//! the context. Named types are interned by canonical name; generic and array
//! instantiations are interned by fingerprint.
//!
//! Member sets are built on first query and cached until [`TypeContext::rebuild`]
//! or [`TypeContext::rebuild_all`] is called. Editing or re-registering a graph
//! never invalidates anything on its own.
//!
//! Lock order: `natives`, `graphs`, `types`, `members`, `degraded`. No lock is
//! held while another query runs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use nodegraph_core::graph::Graph;
use nodegraph_core::types::{natives, GenericConstraint, GenericParameter, TypeRef};
use nodegraph_exec::Value;

use crate::descriptor::{TypeDescriptor, TypeHandle, TypeKind};
use crate::error::ReflectError;
use crate::fingerprint;
use crate::member::{DegradedSubstitution, MemberInfo, MemberSet};
use crate::native::{NativeRegistry, NativeType};
use crate::resolve;
use crate::synthetic::SyntheticType;

#[derive(Debug, Clone)]
struct TypeEntry {
    descriptor: TypeDescriptor,
    reference: TypeRef,
}

#[derive(Debug, Default)]
struct TypeTable {
    entries: Vec<TypeEntry>,
    by_name: HashMap<String, TypeHandle>,
    instantiations: HashMap<blake3::Hash, TypeHandle>,
}

impl TypeTable {
    fn get(&self, handle: TypeHandle) -> Option<&TypeEntry> {
        self.entries.get(handle.0 as usize)
    }

    fn push(&mut self, descriptor: TypeDescriptor, reference: TypeRef) -> TypeHandle {
        let handle = TypeHandle(self.entries.len() as u32);
        self.entries.push(TypeEntry {
            descriptor,
            reference,
        });
        handle
    }
}

/// Registry of graph-defined and host types.
pub struct TypeContext {
    pub(crate) natives: RwLock<NativeRegistry>,
    pub(crate) graphs: RwLock<HashMap<String, Arc<Graph>>>,
    types: RwLock<TypeTable>,
    members: RwLock<HashMap<TypeHandle, Arc<MemberSet>>>,
    degraded: RwLock<Vec<DegradedSubstitution>>,
    object: TypeHandle,
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeContext {
    /// A context with the built-in host types.
    pub fn new() -> Self {
        Self::with_natives(NativeRegistry::with_builtins())
    }

    pub fn with_natives(registry: NativeRegistry) -> Self {
        let mut table = TypeTable::default();
        let object = table.push(
            TypeDescriptor::Native {
                name: natives::OBJECT.to_string(),
            },
            TypeRef::object(),
        );
        table.by_name.insert(natives::OBJECT.to_string(), object);
        TypeContext {
            natives: RwLock::new(registry),
            graphs: RwLock::new(HashMap::new()),
            types: RwLock::new(table),
            members: RwLock::new(HashMap::new()),
            degraded: RwLock::new(Vec::new()),
            object,
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Adds or replaces a host type. A name that previously resolved to
    /// [`TypeDescriptor::Missing`] resolves to the new type, under the same
    /// handle.
    pub fn register_native(&self, ty: NativeType) -> TypeHandle {
        let name = ty.name.clone();
        self.natives.write().register(ty);
        self.intern(
            TypeDescriptor::Native { name: name.clone() },
            TypeRef::native(&name),
            true,
        )
    }

    /// Adds or replaces a graph under its qualified name.
    ///
    /// Cached member sets built from an earlier version of the graph are kept
    /// until [`rebuild`](Self::rebuild) is called.
    pub fn register_graph(&self, graph: Graph) -> TypeHandle {
        self.register_shared_graph(Arc::new(graph))
    }

    pub fn register_shared_graph(&self, graph: Arc<Graph>) -> TypeHandle {
        let name = graph.qualified_name();
        let descriptor = graph_descriptor(&graph);
        self.graphs.write().insert(name.clone(), graph);
        let handle = self.intern(descriptor, TypeRef::graph(&name), true);
        debug!(graph = %name, handle = %handle, "registered graph");
        handle
    }

    pub fn graph(&self, qualified_name: &str) -> Option<Arc<Graph>> {
        self.graphs.read().get(qualified_name).cloned()
    }

    /// Registered graphs, in no particular order.
    pub fn graphs(&self) -> Vec<Arc<Graph>> {
        self.graphs.read().values().cloned().collect()
    }

    /// Interns a named descriptor. With `replace`, an existing entry of the
    /// same name takes the new descriptor; otherwise only a `Missing` entry
    /// does.
    fn intern(&self, descriptor: TypeDescriptor, reference: TypeRef, replace: bool) -> TypeHandle {
        let name = reference.to_string();
        let mut table = self.types.write();
        let existing = table.by_name.get(&name).copied();
        if let Some(handle) = existing {
            let entry = &mut table.entries[handle.0 as usize];
            if entry.descriptor != descriptor
                && (replace || (entry.descriptor.is_missing() && !descriptor.is_missing()))
            {
                entry.descriptor = descriptor;
                entry.reference = reference;
            }
            return handle;
        }
        let handle = table.push(descriptor, reference);
        table.by_name.insert(name, handle);
        handle
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolves a type reference, or fails if any part of it is unknown or an
    /// instantiation violates its constraints.
    pub fn try_resolve(&self, ty: &TypeRef) -> Result<TypeHandle, ReflectError> {
        match ty {
            TypeRef::Native(name) => {
                if !self.natives.read().contains(name) {
                    return Err(ReflectError::Unresolved { name: name.clone() });
                }
                Ok(self.intern(
                    TypeDescriptor::Native { name: name.clone() },
                    ty.clone(),
                    false,
                ))
            }
            TypeRef::Graph(name) => {
                let graph = self
                    .graph(name)
                    .ok_or_else(|| ReflectError::Unresolved { name: name.clone() })?;
                Ok(self.intern(graph_descriptor(&graph), ty.clone(), false))
            }
            TypeRef::GenericParam(name) => Ok(self.intern(
                TypeDescriptor::GenericParameter {
                    name: name.clone(),
                    constraints: Vec::new(),
                },
                ty.clone(),
                false,
            )),
            TypeRef::Generic {
                definition,
                arguments,
            } => {
                let definition = self.try_resolve(definition)?;
                let arguments = arguments
                    .iter()
                    .map(|a| self.try_resolve(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.instantiate(definition, &arguments)
            }
            TypeRef::Array(element) => {
                let element = self.try_resolve(element)?;
                self.array_of(element)
            }
        }
    }

    /// Resolves a type reference. Anything that fails to resolve becomes a
    /// [`TypeDescriptor::Missing`] entry with an empty member set.
    ///
    /// Unknown type arguments and array elements become missing on their
    /// own, so ``List`1[Game.Ghost]`` is still a list.
    pub fn resolve(&self, ty: &TypeRef) -> TypeHandle {
        let resolved = match ty {
            TypeRef::Generic {
                definition,
                arguments,
            } => self.try_resolve(definition).and_then(|definition| {
                let arguments: Vec<TypeHandle> = arguments.iter().map(|a| self.resolve(a)).collect();
                self.instantiate(definition, &arguments)
            }),
            TypeRef::Array(element) => self.array_of(self.resolve(element)),
            _ => self.try_resolve(ty),
        };
        match resolved {
            Ok(handle) => handle,
            Err(err) => {
                warn!(ty = %ty, error = %err, "type resolved as missing");
                self.intern(
                    TypeDescriptor::Missing {
                        name: ty.to_string(),
                    },
                    ty.clone(),
                    false,
                )
            }
        }
    }

    /// Looks up an already interned named type.
    pub fn lookup(&self, full_name: &str) -> Option<TypeHandle> {
        self.types.read().by_name.get(full_name).copied()
    }

    /// Closes a generic definition over `arguments`.
    ///
    /// Repeated requests with the same definition and arguments return the
    /// same handle. Arguments that are themselves generic parameters or
    /// missing types are not checked against constraints.
    pub fn instantiate(
        &self,
        definition: TypeHandle,
        arguments: &[TypeHandle],
    ) -> Result<TypeHandle, ReflectError> {
        let def_entry = self.entry(definition)?;
        let params = self.generic_params_of(&def_entry.descriptor);
        let def_name = def_entry.reference.to_string();
        if params.is_empty() {
            return Err(ReflectError::NotGeneric { name: def_name });
        }
        if params.len() != arguments.len() {
            return Err(ReflectError::GenericArity {
                definition: def_name,
                expected: params.len(),
                got: arguments.len(),
            });
        }

        let argument_refs = arguments
            .iter()
            .map(|&a| self.type_ref(a))
            .collect::<Result<Vec<_>, _>>()?;
        for ((param, &argument), argument_ref) in params.iter().zip(arguments).zip(&argument_refs) {
            for constraint in &param.constraints {
                if !self.satisfies(argument, constraint) {
                    return Err(ReflectError::ConstraintViolation {
                        definition: def_name,
                        parameter: param.name.clone(),
                        argument: argument_ref.to_string(),
                        constraint: format!("{constraint:?}"),
                    });
                }
            }
        }

        let argument_names: Vec<String> = argument_refs.iter().map(ToString::to_string).collect();
        let argument_names: Vec<&str> = argument_names.iter().map(String::as_str).collect();
        let key = fingerprint::instantiation(&def_name, &argument_names);
        let reference = TypeRef::generic(def_entry.reference, argument_refs);

        let mut table = self.types.write();
        if let Some(&handle) = table.instantiations.get(&key) {
            return Ok(handle);
        }
        let handle = table.push(
            TypeDescriptor::GenericInstantiation {
                definition,
                arguments: arguments.to_vec(),
            },
            reference.clone(),
        );
        table.instantiations.insert(key, handle);
        drop(table);
        debug!(ty = %reference, handle = %handle, "instantiated generic type");
        Ok(handle)
    }

    /// The single-dimension array type of `element`, cached like generic
    /// instantiations.
    pub fn array_of(&self, element: TypeHandle) -> Result<TypeHandle, ReflectError> {
        let element_ref = self.type_ref(element)?;
        let key = fingerprint::array(&element_ref.to_string());
        let reference = TypeRef::array(element_ref);

        let mut table = self.types.write();
        if let Some(&handle) = table.instantiations.get(&key) {
            return Ok(handle);
        }
        let handle = table.push(TypeDescriptor::ArrayInstantiation { element }, reference);
        table.instantiations.insert(key, handle);
        Ok(handle)
    }

    fn generic_params_of(&self, descriptor: &TypeDescriptor) -> Vec<GenericParameter> {
        match descriptor {
            TypeDescriptor::Native { name } => self
                .natives
                .read()
                .get(name)
                .map(|t| t.generic_params.clone())
                .unwrap_or_default(),
            TypeDescriptor::GraphClass { graph } | TypeDescriptor::GraphInterface { graph } => self
                .graph(graph)
                .map(|g| g.generic_params.clone())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn satisfies(&self, argument: TypeHandle, constraint: &GenericConstraint) -> bool {
        match self.kind(argument) {
            Some(TypeKind::GenericParameter | TypeKind::Missing) => return true,
            None => return false,
            Some(_) => {}
        }
        match constraint {
            GenericConstraint::ValueType => self.is_value_type(argument),
            GenericConstraint::ReferenceType => !self.is_value_type(argument),
            GenericConstraint::DefaultConstructor => self.is_default_constructible(argument),
            GenericConstraint::Subtype(bound) if bound.contains_generic_params() => true,
            GenericConstraint::Subtype(bound) => match self.try_resolve(bound) {
                Ok(bound) => self.is_assignable(argument, bound),
                Err(_) => false,
            },
        }
    }

    // -----------------------------------------------------------------------
    // Descriptor queries
    // -----------------------------------------------------------------------

    fn entry(&self, handle: TypeHandle) -> Result<TypeEntry, ReflectError> {
        self.types
            .read()
            .get(handle)
            .cloned()
            .ok_or(ReflectError::UnknownHandle { handle: handle.0 })
    }

    pub fn descriptor(&self, handle: TypeHandle) -> Result<TypeDescriptor, ReflectError> {
        self.entry(handle).map(|e| e.descriptor)
    }

    /// The type reference a handle was interned under.
    pub fn type_ref(&self, handle: TypeHandle) -> Result<TypeRef, ReflectError> {
        self.entry(handle).map(|e| e.reference)
    }

    /// Canonical full name, e.g. ``List`1[Game.Enemy]``.
    pub fn full_name(&self, handle: TypeHandle) -> Result<String, ReflectError> {
        self.type_ref(handle).map(|r| r.to_string())
    }

    pub fn kind(&self, handle: TypeHandle) -> Option<TypeKind> {
        self.types.read().get(handle).map(|e| e.descriptor.kind())
    }

    /// Number of interned types.
    pub fn len(&self) -> usize {
        self.types.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn object(&self) -> TypeHandle {
        self.object
    }

    pub fn is_value_type(&self, handle: TypeHandle) -> bool {
        match self.descriptor(handle) {
            Ok(TypeDescriptor::Native { name }) => self
                .natives
                .read()
                .get(&name)
                .is_some_and(|t| t.is_value_type),
            Ok(TypeDescriptor::GenericInstantiation { definition, .. }) => {
                self.is_value_type(definition)
            }
            _ => false,
        }
    }

    pub fn is_default_constructible(&self, handle: TypeHandle) -> bool {
        match self.descriptor(handle) {
            Ok(TypeDescriptor::Native { name }) => self
                .natives
                .read()
                .get(&name)
                .is_some_and(|t| t.default_constructible),
            Ok(TypeDescriptor::GraphClass { graph }) => self
                .graph(&graph)
                .is_some_and(|g| g.constructor(0).is_some() || g.constructors().next().is_none()),
            Ok(TypeDescriptor::GenericInstantiation { definition, .. }) => {
                self.is_default_constructible(definition)
            }
            _ => false,
        }
    }

    /// Returns `true` for an open generic definition.
    pub fn is_generic_definition(&self, handle: TypeHandle) -> bool {
        self.descriptor(handle)
            .map(|d| !self.generic_params_of(&d).is_empty())
            .unwrap_or(false)
    }

    /// Type arguments of an instantiation, or the parameters of a
    /// definition.
    pub fn generic_arguments(&self, handle: TypeHandle) -> Vec<TypeHandle> {
        match self.descriptor(handle) {
            Ok(TypeDescriptor::GenericInstantiation { arguments, .. }) => arguments,
            Ok(descriptor) => self
                .generic_params_of(&descriptor)
                .iter()
                .map(|p| self.resolve(&TypeRef::param(&p.name)))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn generic_definition(&self, handle: TypeHandle) -> Option<TypeHandle> {
        match self.descriptor(handle) {
            Ok(TypeDescriptor::GenericInstantiation { definition, .. }) => Some(definition),
            _ => None,
        }
    }

    pub fn element_type(&self, handle: TypeHandle) -> Option<TypeHandle> {
        match self.descriptor(handle) {
            Ok(TypeDescriptor::ArrayInstantiation { element }) => Some(element),
            _ => None,
        }
    }

    /// Parameter name to argument bindings of an instantiation.
    pub(crate) fn bindings(&self, handle: TypeHandle) -> HashMap<String, TypeRef> {
        let Ok(TypeDescriptor::GenericInstantiation {
            definition,
            arguments,
        }) = self.descriptor(handle)
        else {
            return HashMap::new();
        };
        let Ok(definition) = self.descriptor(definition) else {
            return HashMap::new();
        };
        self.generic_params_of(&definition)
            .into_iter()
            .zip(arguments)
            .filter_map(|(p, a)| Some((p.name, self.type_ref(a).ok()?)))
            .collect()
    }

    /// The direct base type. `object` and interfaces have none.
    pub fn base_type(&self, handle: TypeHandle) -> Option<TypeHandle> {
        match self.descriptor(handle).ok()? {
            TypeDescriptor::Native { name } => {
                let base = self.natives.read().get(&name)?.base.clone()?;
                Some(self.resolve(&TypeRef::native(&base)))
            }
            TypeDescriptor::GraphClass { graph } => {
                let graph = self.graph(&graph)?;
                Some(match &graph.base {
                    Some(base) => self.resolve(base),
                    None => self.object,
                })
            }
            TypeDescriptor::GenericInstantiation { definition, .. } => {
                match self.descriptor(definition).ok()? {
                    TypeDescriptor::GraphClass { graph } => {
                        let graph = self.graph(&graph)?;
                        Some(match &graph.base {
                            Some(base) => {
                                self.resolve(&resolve::substitute(base, &self.bindings(handle)))
                            }
                            None => self.object,
                        })
                    }
                    TypeDescriptor::Native { .. } => self.base_type(definition),
                    _ => None,
                }
            }
            TypeDescriptor::ArrayInstantiation { .. } => Some(self.object),
            TypeDescriptor::GraphInterface { .. }
            | TypeDescriptor::GenericParameter { .. }
            | TypeDescriptor::Missing { .. } => None,
        }
    }

    /// Interfaces declared directly on a graph type or instantiation.
    pub fn interfaces(&self, handle: TypeHandle) -> Vec<TypeHandle> {
        let (graph, bindings) = match self.descriptor(handle) {
            Ok(TypeDescriptor::GraphClass { graph } | TypeDescriptor::GraphInterface { graph }) => {
                (graph, HashMap::new())
            }
            Ok(TypeDescriptor::GenericInstantiation { definition, .. }) => {
                match self.descriptor(definition) {
                    Ok(
                        TypeDescriptor::GraphClass { graph } | TypeDescriptor::GraphInterface { graph },
                    ) => (graph, self.bindings(handle)),
                    _ => return Vec::new(),
                }
            }
            _ => return Vec::new(),
        };
        let Some(graph) = self.graph(&graph) else {
            return Vec::new();
        };
        graph
            .interfaces
            .iter()
            .map(|i| self.resolve(&resolve::substitute(i, &bindings)))
            .collect()
    }

    /// Returns `true` if a value of type `from` can be used where `to` is
    /// expected: identity, `object`, or anything on the base and interface
    /// chain.
    pub fn is_assignable(&self, from: TypeHandle, to: TypeHandle) -> bool {
        if from == to {
            return true;
        }
        if to == self.object {
            return self.kind(from).is_some_and(|k| k != TypeKind::Missing);
        }
        let mut pending = vec![from];
        let mut seen = HashSet::new();
        while let Some(current) = pending.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            pending.extend(self.base_type(current));
            pending.extend(self.interfaces(current));
        }
        false
    }

    /// Returns `true` if `value`'s runtime type is assignable to `handle`.
    /// Null is an instance of nothing; list element types are erased to
    /// `object`.
    pub fn is_instance_of(&self, value: &Value, handle: TypeHandle) -> bool {
        if value.is_null() {
            return false;
        }
        match self.try_resolve(&value.type_ref()) {
            Ok(runtime) => self.is_assignable(runtime, handle),
            Err(_) => false,
        }
    }

    // -----------------------------------------------------------------------
    // Members
    // -----------------------------------------------------------------------

    /// All members of a type, inherited ones included. Unknown handles have
    /// an empty set.
    pub fn members(&self, handle: TypeHandle) -> Arc<MemberSet> {
        self.members_guarded(handle, &mut Vec::new())
    }

    /// `building` holds the handles whose sets are under construction, so a
    /// cyclic base chain ends with an empty set instead of recursing.
    pub(crate) fn members_guarded(
        &self,
        handle: TypeHandle,
        building: &mut Vec<TypeHandle>,
    ) -> Arc<MemberSet> {
        if let Some(set) = self.members.read().get(&handle) {
            return Arc::clone(set);
        }
        if building.contains(&handle) {
            return Arc::new(MemberSet::default());
        }

        building.push(handle);
        let (set, degraded) = resolve::build(self, handle, building);
        building.pop();

        let built = Arc::new(set);
        let (set, inserted) = {
            let mut members = self.members.write();
            match members.get(&handle) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    members.insert(handle, Arc::clone(&built));
                    (built, true)
                }
            }
        };
        if inserted {
            debug!(handle = %handle, members = set.len(), "built member set");
            if !degraded.is_empty() {
                for d in &degraded {
                    warn!(ty = %d.type_name, member = %d.member, reason = %d.reason, "degraded substitution");
                }
                self.degraded.write().extend(degraded);
            }
        }
        set
    }

    pub fn fields(&self, handle: TypeHandle) -> Vec<MemberInfo> {
        self.members(handle).fields.clone()
    }

    pub fn properties(&self, handle: TypeHandle) -> Vec<MemberInfo> {
        self.members(handle).properties.clone()
    }

    pub fn methods(&self, handle: TypeHandle) -> Vec<MemberInfo> {
        self.members(handle).methods.clone()
    }

    pub fn constructors(&self, handle: TypeHandle) -> Vec<MemberInfo> {
        self.members(handle).constructors.clone()
    }

    /// A field or property by name.
    pub fn data_member(&self, handle: TypeHandle, name: &str) -> Option<MemberInfo> {
        self.members(handle).data_member(name).cloned()
    }

    pub fn method(&self, handle: TypeHandle, name: &str, arity: usize) -> Option<MemberInfo> {
        self.members(handle).method(name, arity).cloned()
    }

    /// Drops the cached member set of `handle` and of every cached type that
    /// depends on it: subtypes, instantiations and types inheriting its
    /// members. Degradation records of dropped instantiations go too.
    pub fn rebuild(&self, handle: TypeHandle) {
        let cached: Vec<(TypeHandle, Arc<MemberSet>)> = self
            .members
            .read()
            .iter()
            .map(|(h, set)| (*h, Arc::clone(set)))
            .collect();

        let mut stale: HashSet<TypeHandle> = HashSet::from([handle]);
        loop {
            let before = stale.len();
            for (h, set) in &cached {
                if stale.contains(h) {
                    continue;
                }
                let depends = set.iter().any(|m| stale.contains(&m.declaring_type))
                    || self.descriptor(*h).is_ok_and(|d| d.parts().iter().any(|p| stale.contains(p)))
                    || self.base_type(*h).is_some_and(|b| stale.contains(&b));
                if depends {
                    stale.insert(*h);
                }
            }
            if stale.len() == before {
                break;
            }
        }

        self.members.write().retain(|h, _| !stale.contains(h));
        self.degraded
            .write()
            .retain(|d| !stale.contains(&d.instantiation));
        debug!(handle = %handle, invalidated = stale.len(), "invalidated member sets");
    }

    /// Drops every cached member set and degradation record.
    pub fn rebuild_all(&self) {
        self.members.write().clear();
        self.degraded.write().clear();
        debug!("invalidated all member sets");
    }

    /// Members of generic instantiations exposed with their open signature
    /// because substitution failed, for the member sets built so far.
    pub fn degraded_substitutions(&self) -> Vec<DegradedSubstitution> {
        self.degraded.read().clone()
    }

    // -----------------------------------------------------------------------
    // Synthetic types
    // -----------------------------------------------------------------------

    /// Wraps a handle as a [`SyntheticType`].
    pub fn synthetic(self: &Arc<Self>, handle: TypeHandle) -> Result<SyntheticType, ReflectError> {
        let full_name = self.full_name(handle)?;
        Ok(SyntheticType::new(handle, full_name, Arc::clone(self)))
    }

    /// Resolves and wraps a type reference.
    pub fn synthetic_for(self: &Arc<Self>, ty: &TypeRef) -> SyntheticType {
        let handle = self.resolve(ty);
        SyntheticType::new(handle, ty.to_string(), Arc::clone(self))
    }
}

fn graph_descriptor(graph: &Graph) -> TypeDescriptor {
    let name = graph.qualified_name();
    if graph.is_interface() {
        TypeDescriptor::GraphInterface { graph: name }
    } else {
        TypeDescriptor::GraphClass { graph: name }
    }
}
