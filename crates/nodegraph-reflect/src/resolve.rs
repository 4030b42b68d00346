//! Member-set construction and generic substitution.
//!
//! For an instantiation, every signature type of every member of the open
//! definition is classified:
//!
//! - no generic parameter: kept as is;
//! - a lone generic parameter: replaced by its argument;
//! - a compound type mentioning parameters (nested generic, array): closed
//!   over the arguments and resolved, after checking that the host can name
//!   it with graph types standing in as `object`.
//!
//! A member is substituted only if all of its signature types are. Otherwise
//! it keeps its open signature, is marked [`Substitution::Degraded`] and a
//! [`DegradedSubstitution`] is recorded. Members are never partially
//! substituted. A substituted member also carries its [`HostSignature`],
//! the closed signature with graph types standing in as `object`.

use std::collections::HashMap;

use nodegraph_core::graph::Graph;
use nodegraph_core::types::TypeRef;

use crate::context::TypeContext;
use crate::descriptor::{TypeDescriptor, TypeHandle};
use crate::member::{
    DegradedSubstitution, HostSignature, MemberInfo, MemberKind, MemberOrigin, MemberSet,
    Substitution,
};
use crate::native::{NativeType, ARRAY};

/// Replaces generic parameters bound in `bindings`; unbound ones stay.
pub(crate) fn substitute(ty: &TypeRef, bindings: &HashMap<String, TypeRef>) -> TypeRef {
    match ty {
        TypeRef::GenericParam(name) => bindings.get(name).cloned().unwrap_or_else(|| ty.clone()),
        TypeRef::Native(_) | TypeRef::Graph(_) => ty.clone(),
        TypeRef::Generic {
            definition,
            arguments,
        } => TypeRef::generic(
            substitute(definition, bindings),
            arguments.iter().map(|a| substitute(a, bindings)).collect(),
        ),
        TypeRef::Array(element) => TypeRef::array(substitute(element, bindings)),
    }
}

/// The host-side name of a closed type: graph types become `object`, host
/// types must be registered. `None` if the host cannot name it.
pub(crate) fn placeholder(ctx: &TypeContext, ty: &TypeRef) -> Option<TypeRef> {
    match ty {
        TypeRef::Native(name) => ctx.natives.read().contains(name).then(|| ty.clone()),
        TypeRef::Graph(name) => ctx.graph(name).map(|_| TypeRef::object()),
        TypeRef::GenericParam(_) => None,
        TypeRef::Generic {
            definition,
            arguments,
        } => {
            let arguments = arguments
                .iter()
                .map(|a| placeholder(ctx, a))
                .collect::<Option<Vec<_>>>()?;
            match definition.as_ref() {
                TypeRef::Graph(_) => placeholder(ctx, definition),
                definition => Some(TypeRef::generic(placeholder(ctx, definition)?, arguments)),
            }
        }
        TypeRef::Array(element) => placeholder(ctx, element).map(TypeRef::array),
    }
}

/// Resolved signature of one member.
struct Signature {
    ty: TypeHandle,
    params: Vec<TypeHandle>,
    substitution: Substitution,
    host_signature: Option<HostSignature>,
}

/// One closed signature type.
struct Closed {
    handle: TypeHandle,
    /// Host-side name; graph types become `object`.
    host: TypeRef,
    /// Whether a generic parameter was replaced.
    changed: bool,
}

struct Builder<'a> {
    ctx: &'a TypeContext,
    handle: TypeHandle,
    owner: TypeRef,
    /// `Some` while building an instantiation.
    bindings: Option<HashMap<String, TypeRef>>,
    set: MemberSet,
    degraded: Vec<DegradedSubstitution>,
}

impl Builder<'_> {
    fn add(
        &mut self,
        name: &str,
        kind: MemberKind,
        origin: MemberOrigin,
        ty: &TypeRef,
        params: &[TypeRef],
        is_static: bool,
    ) {
        let Signature {
            ty,
            params,
            substitution,
            host_signature,
        } = self.signature(name, ty, params);
        self.set.push(MemberInfo {
            name: name.to_string(),
            kind,
            declaring_type: self.handle,
            owner: self.owner.clone(),
            ty,
            params,
            is_static,
            origin,
            substitution,
            host_signature,
        });
    }

    fn signature(&mut self, name: &str, ty: &TypeRef, params: &[TypeRef]) -> Signature {
        let open = |ctx: &TypeContext, substitution: Substitution| Signature {
            ty: ctx.resolve(ty),
            params: params.iter().map(|p| ctx.resolve(p)).collect(),
            substitution,
            host_signature: None,
        };
        let Some(bindings) = &self.bindings else {
            return open(self.ctx, Substitution::Unchanged);
        };

        let mut closed = Vec::with_capacity(params.len() + 1);
        let mut host = Vec::with_capacity(params.len() + 1);
        let mut substituted = false;
        for sig in std::iter::once(ty).chain(params) {
            match close(self.ctx, sig, bindings) {
                Ok(result) => {
                    substituted |= result.changed;
                    closed.push(result.handle);
                    host.push(result.host);
                }
                Err(reason) => {
                    self.degraded.push(DegradedSubstitution {
                        instantiation: self.handle,
                        type_name: self.owner.to_string(),
                        member: name.to_string(),
                        reason,
                    });
                    return open(self.ctx, Substitution::Degraded);
                }
            }
        }
        if !substituted {
            return open(self.ctx, Substitution::Unchanged);
        }
        let ty = closed.remove(0);
        let host_ty = host.remove(0);
        Signature {
            ty,
            params: closed,
            substitution: Substitution::Substituted,
            host_signature: Some(HostSignature {
                ty: host_ty,
                params: host,
            }),
        }
    }

    fn add_native(&mut self, native: &NativeType) {
        for m in &native.members {
            self.add(&m.name, m.kind, MemberOrigin::Native, &m.ty, &m.params, m.is_static);
        }
    }

    fn add_graph(&mut self, graph: &Graph) {
        let interface = graph.is_interface();
        if !interface {
            for v in graph.variables() {
                self.add(&v.name, MemberKind::Field, MemberOrigin::Graph, &v.ty, &[], false);
            }
        }
        for p in graph.properties() {
            let kind = MemberKind::Property {
                can_read: p.can_read(),
                can_write: p.can_write(),
            };
            self.add(&p.name, kind, MemberOrigin::Graph, &p.ty, &[], false);
        }
        for f in graph.functions() {
            let params: Vec<TypeRef> = f.params.iter().map(|p| p.ty.clone()).collect();
            self.add(
                &f.name,
                MemberKind::Method,
                MemberOrigin::Graph,
                &f.return_type,
                &params,
                f.is_static,
            );
        }
        if interface {
            return;
        }
        let mut constructors: Vec<Vec<TypeRef>> = graph
            .constructors()
            .map(|c| c.params.iter().map(|p| p.ty.clone()).collect())
            .collect();
        // A class without constructors gets the implicit parameterless one.
        if constructors.is_empty() {
            constructors.push(Vec::new());
        }
        for params in constructors {
            let kind = MemberKind::Constructor;
            self.add(".ctor", kind, MemberOrigin::Graph, &TypeRef::void(), &params, false);
        }
    }

    /// Adds the declared members of a definition. Returns `true` for an
    /// interface.
    fn add_declared(&mut self, descriptor: &TypeDescriptor) -> bool {
        match descriptor {
            TypeDescriptor::Native { name } => {
                let native = self.ctx.natives.read().get(name).cloned();
                if let Some(native) = native {
                    self.add_native(&native);
                }
                false
            }
            TypeDescriptor::GraphClass { graph } | TypeDescriptor::GraphInterface { graph } => {
                match self.ctx.graph(graph) {
                    Some(graph) => {
                        self.add_graph(&graph);
                        graph.is_interface()
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }
}

/// Closes one signature type over the bindings.
fn close(
    ctx: &TypeContext,
    sig: &TypeRef,
    bindings: &HashMap<String, TypeRef>,
) -> Result<Closed, String> {
    let host_or_object = |ty: &TypeRef| placeholder(ctx, ty).unwrap_or_else(TypeRef::object);
    if !sig.contains_generic_params() {
        return Ok(Closed {
            handle: ctx.resolve(sig),
            host: host_or_object(sig),
            changed: false,
        });
    }
    if let TypeRef::GenericParam(name) = sig {
        let argument = bindings
            .get(name)
            .ok_or_else(|| format!("no argument for generic parameter {name}"))?;
        let handle = ctx.try_resolve(argument).map_err(|e| e.to_string())?;
        return Ok(Closed {
            handle,
            host: host_or_object(argument),
            changed: true,
        });
    }

    let closed = substitute(sig, bindings);
    if closed.contains_generic_params() {
        return Err(format!("{sig} is not closed by the type arguments"));
    }
    let host = placeholder(ctx, &closed).ok_or_else(|| format!("no host placeholder for {closed}"))?;
    let handle = ctx.try_resolve(&closed).map_err(|e| e.to_string())?;
    Ok(Closed {
        handle,
        host,
        changed: true,
    })
}

/// Builds the member set of `handle`, inherited members included.
pub(crate) fn build(
    ctx: &TypeContext,
    handle: TypeHandle,
    building: &mut Vec<TypeHandle>,
) -> (MemberSet, Vec<DegradedSubstitution>) {
    let (Ok(descriptor), Ok(owner)) = (ctx.descriptor(handle), ctx.type_ref(handle)) else {
        return Default::default();
    };
    let mut builder = Builder {
        ctx,
        handle,
        owner,
        bindings: None,
        set: MemberSet::default(),
        degraded: Vec::new(),
    };

    let interface = match &descriptor {
        TypeDescriptor::GenericInstantiation { definition, .. } => {
            builder.bindings = Some(ctx.bindings(handle));
            match ctx.descriptor(*definition) {
                Ok(definition) => builder.add_declared(&definition),
                Err(_) => false,
            }
        }
        TypeDescriptor::ArrayInstantiation { element } => {
            let element = ctx.type_ref(*element).unwrap_or_else(|_| TypeRef::object());
            builder.bindings = Some(HashMap::from([("T".to_string(), element)]));
            let array = ctx.natives.read().get(ARRAY).cloned();
            if let Some(array) = array {
                builder.add_native(&array);
            }
            false
        }
        TypeDescriptor::GenericParameter { .. } | TypeDescriptor::Missing { .. } => false,
        declared => builder.add_declared(declared),
    };

    let mut inherited_from: Vec<TypeHandle> = ctx.base_type(handle).into_iter().collect();
    if interface {
        inherited_from.extend(ctx.interfaces(handle));
    }
    for base in inherited_from {
        let inherited = ctx.members_guarded(base, building);
        for member in inherited.iter() {
            builder.set.inherit(member.clone());
        }
    }

    (builder.set, builder.degraded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_replaces_bound_parameters_only() {
        let bindings = HashMap::from([("T".to_string(), TypeRef::graph("Game.Enemy"))]);
        let ty = TypeRef::generic(
            TypeRef::native("Pair`2"),
            vec![TypeRef::param("T"), TypeRef::param("U")],
        );
        assert_eq!(
            substitute(&ty, &bindings).to_string(),
            "Pair`2[Game.Enemy,U]"
        );
        assert_eq!(
            substitute(&TypeRef::array(TypeRef::param("T")), &bindings).to_string(),
            "Game.Enemy[]"
        );
    }

    #[test]
    fn placeholders_erase_graph_types() {
        let ctx = TypeContext::new();
        ctx.register_graph(Graph::new("Game", "Enemy"));
        let list = TypeRef::list_of(TypeRef::graph("Game.Enemy"));
        assert_eq!(
            placeholder(&ctx, &list),
            Some(TypeRef::list_of(TypeRef::object()))
        );
        assert_eq!(
            placeholder(&ctx, &TypeRef::array(TypeRef::graph("Game.Enemy"))),
            Some(TypeRef::array(TypeRef::object()))
        );
        assert_eq!(
            placeholder(&ctx, &TypeRef::list_of(TypeRef::graph("Game.Ghost"))),
            None
        );
        let unknown = TypeRef::generic(TypeRef::native("Triple`3"), vec![TypeRef::int()]);
        assert_eq!(placeholder(&ctx, &unknown), None);
    }

    #[test]
    fn open_definitions_are_not_degraded() {
        let ctx = TypeContext::new();
        let list = ctx.resolve(&TypeRef::native("List`1"));
        let members = ctx.members(list);
        assert!(members.iter().all(|m| m.substitution == Substitution::Unchanged));
        assert!(ctx.degraded_substitutions().is_empty());
        let get = members.method("Get", 1).unwrap();
        assert_eq!(ctx.full_name(get.ty).unwrap(), "T");
    }
}
