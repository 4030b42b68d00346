//! The public type value.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use nodegraph_core::types::TypeRef;
use nodegraph_exec::Value;

use crate::context::TypeContext;
use crate::descriptor::{TypeDescriptor, TypeHandle, TypeKind};
use crate::error::ReflectError;
use crate::member::MemberInfo;

/// A graph-defined, host or synthesized type, answering the same queries
/// whatever backs it.
///
/// Equality and hashing use the canonical full name only. Two values wrapping
/// the same logical type are equal even when they come from different
/// contexts, e.g. before and after a reload.
#[derive(Clone)]
pub struct SyntheticType {
    handle: TypeHandle,
    full_name: Arc<str>,
    context: Arc<TypeContext>,
}

impl SyntheticType {
    pub(crate) fn new(handle: TypeHandle, full_name: String, context: Arc<TypeContext>) -> Self {
        SyntheticType {
            handle,
            full_name: full_name.into(),
            context,
        }
    }

    fn wrap(&self, handle: TypeHandle) -> Option<SyntheticType> {
        self.context.synthetic(handle).ok()
    }

    fn wrap_all(&self, handles: Vec<TypeHandle>) -> Vec<SyntheticType> {
        handles.into_iter().filter_map(|h| self.wrap(h)).collect()
    }

    pub fn handle(&self) -> TypeHandle {
        self.handle
    }

    pub fn context(&self) -> &Arc<TypeContext> {
        &self.context
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The name without namespace or type arguments. Array types keep their
    /// `[]` suffix: `Game.Enemy[]` is named `Enemy[]`.
    pub fn name(&self) -> String {
        let mut element = self.full_name();
        let mut rank = 0;
        while let Some(inner) = element.strip_suffix("[]") {
            element = inner;
            rank += 1;
        }
        let base = element.split('[').next().unwrap_or(element);
        let short = base.rsplit('.').next().unwrap_or(base);
        format!("{short}{}", "[]".repeat(rank))
    }

    pub fn descriptor(&self) -> Option<TypeDescriptor> {
        self.context.descriptor(self.handle).ok()
    }

    pub fn kind(&self) -> Option<TypeKind> {
        self.context.kind(self.handle)
    }

    pub fn type_ref(&self) -> TypeRef {
        self.context
            .type_ref(self.handle)
            .unwrap_or_else(|_| TypeRef::object())
    }

    pub fn is_missing(&self) -> bool {
        self.kind() == Some(TypeKind::Missing)
    }

    pub fn is_interface(&self) -> bool {
        match self.descriptor() {
            Some(TypeDescriptor::GraphInterface { .. }) => true,
            Some(TypeDescriptor::GenericInstantiation { definition, .. }) => {
                self.context.kind(definition) == Some(TypeKind::GraphInterface)
            }
            _ => false,
        }
    }

    pub fn is_array(&self) -> bool {
        self.kind() == Some(TypeKind::ArrayInstantiation)
    }

    pub fn is_generic_definition(&self) -> bool {
        self.context.is_generic_definition(self.handle)
    }

    pub fn is_value_type(&self) -> bool {
        self.context.is_value_type(self.handle)
    }

    pub fn fields(&self) -> Vec<MemberInfo> {
        self.context.fields(self.handle)
    }

    pub fn properties(&self) -> Vec<MemberInfo> {
        self.context.properties(self.handle)
    }

    pub fn methods(&self) -> Vec<MemberInfo> {
        self.context.methods(self.handle)
    }

    pub fn constructors(&self) -> Vec<MemberInfo> {
        self.context.constructors(self.handle)
    }

    pub fn data_member(&self, name: &str) -> Option<MemberInfo> {
        self.context.data_member(self.handle, name)
    }

    pub fn method(&self, name: &str, arity: usize) -> Option<MemberInfo> {
        self.context.method(self.handle, name, arity)
    }

    pub fn base_type(&self) -> Option<SyntheticType> {
        self.wrap(self.context.base_type(self.handle)?)
    }

    pub fn interfaces(&self) -> Vec<SyntheticType> {
        self.wrap_all(self.context.interfaces(self.handle))
    }

    pub fn generic_arguments(&self) -> Vec<SyntheticType> {
        self.wrap_all(self.context.generic_arguments(self.handle))
    }

    pub fn generic_definition(&self) -> Option<SyntheticType> {
        self.wrap(self.context.generic_definition(self.handle)?)
    }

    pub fn element_type(&self) -> Option<SyntheticType> {
        self.wrap(self.context.element_type(self.handle)?)
    }

    /// Returns `true` if a value of `other` can be used where `self` is
    /// expected. Types from another context are compared by name.
    pub fn is_assignable_from(&self, other: &SyntheticType) -> bool {
        let other = if Arc::ptr_eq(&self.context, &other.context) {
            other.handle
        } else {
            self.context.resolve(&other.type_ref())
        };
        self.context.is_assignable(other, self.handle)
    }

    pub fn is_instance_of(&self, value: &Value) -> bool {
        self.context.is_instance_of(value, self.handle)
    }

    /// The array type of this type.
    pub fn make_array(&self) -> Result<SyntheticType, ReflectError> {
        let array = self.context.array_of(self.handle)?;
        self.context.synthetic(array)
    }

    /// Closes this generic definition over `arguments`.
    pub fn make_generic(&self, arguments: &[SyntheticType]) -> Result<SyntheticType, ReflectError> {
        let arguments: Vec<TypeHandle> = arguments
            .iter()
            .map(|a| {
                if Arc::ptr_eq(&self.context, &a.context) {
                    a.handle
                } else {
                    self.context.resolve(&a.type_ref())
                }
            })
            .collect();
        let instance = self.context.instantiate(self.handle, &arguments)?;
        self.context.synthetic(instance)
    }
}

impl PartialEq for SyntheticType {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name
    }
}

impl Eq for SyntheticType {}

impl Hash for SyntheticType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_name.hash(state);
    }
}

impl fmt::Debug for SyntheticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SyntheticType").field(&self.full_name).finish()
    }
}

impl fmt::Display for SyntheticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nodegraph_core::graph::Graph;

    #[test]
    fn short_name_drops_namespace_and_arguments() {
        let ctx = Arc::new(TypeContext::new());
        ctx.register_graph(Graph::new("Game", "Enemy"));
        let list = ctx.synthetic_for(&TypeRef::list_of(TypeRef::graph("Game.Enemy")));
        assert_eq!(list.name(), "List`1");
        assert_eq!(list.generic_arguments()[0].name(), "Enemy");
        assert_eq!(list.to_string(), "List`1[Game.Enemy]");
    }

    #[test]
    fn array_names_keep_their_suffix() {
        let ctx = Arc::new(TypeContext::new());
        ctx.register_graph(Graph::new("Game", "Enemy"));
        let enemies = ctx.synthetic_for(&TypeRef::array(TypeRef::graph("Game.Enemy")));
        assert_eq!(enemies.name(), "Enemy[]");
        assert_ne!(enemies.name(), enemies.element_type().unwrap().name());

        let lists = ctx.synthetic_for(&TypeRef::array(TypeRef::list_of(TypeRef::graph("Game.Enemy"))));
        assert_eq!(lists.name(), "List`1[]");
    }
}
