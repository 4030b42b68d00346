//! Instantiation of graph types behind a [`Bridge`].
//!
//! [`Runtime`] owns the type context, the compiled-artifact registry and an
//! interpreter over the context. Instantiating a type picks the compiled
//! artifact registered under the type's full name when one exists, is
//! preferred, and was built from the graph currently registered; every other
//! case interprets the graph.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use nodegraph_core::graph::Graph;
use nodegraph_exec::{graph_name_of, ExecutionHost, Interpreter, Object, Value};
use nodegraph_reflect::{ReflectError, SyntheticType, TypeContext, TypeHandle, TypeKind};

use crate::bridge::Bridge;
use crate::compiled::{graph_hash, CompiledArtifact, CompiledRegistry};
use crate::error::BridgeError;
use crate::options::RuntimeOptions;
use crate::source::{GeneratedSource, SourceGenerator};

pub struct Runtime {
    context: Arc<TypeContext>,
    compiled: CompiledRegistry,
    generator: Option<Arc<dyn SourceGenerator>>,
    interp: Interpreter,
    options: RuntimeOptions,
}

impl Runtime {
    pub fn new(context: Arc<TypeContext>, options: RuntimeOptions) -> Self {
        let host: Arc<dyn ExecutionHost> = Arc::clone(&context) as Arc<dyn ExecutionHost>;
        Runtime {
            interp: Interpreter::new(host, options.engine.clone()),
            context,
            compiled: CompiledRegistry::new(),
            generator: None,
            options,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn SourceGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn context(&self) -> &Arc<TypeContext> {
        &self.context
    }

    pub fn compiled(&self) -> &CompiledRegistry {
        &self.compiled
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interp
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Registers a new version of a graph and drops member sets built from
    /// the old one. Artifacts built from the old version become stale.
    pub fn update_graph(&self, graph: Graph) -> TypeHandle {
        let handle = self.context.register_graph(graph);
        self.context.rebuild(handle);
        handle
    }

    pub fn register_compiled(&self, artifact: CompiledArtifact) {
        self.compiled.register(artifact);
    }

    /// The artifact for `type_name`, if it is usable against the graph
    /// currently registered under `graph_name`.
    fn current_artifact(&self, type_name: &str, graph_name: Option<&str>) -> Option<CompiledArtifact> {
        if !self.options.prefer_compiled {
            return None;
        }
        let artifact = self.compiled.get(type_name)?;
        match graph_name.and_then(|name| self.context.graph(name)) {
            Some(graph) if !artifact.matches(&graph) => {
                warn!(ty = %type_name, "compiled artifact is stale, interpreting");
                None
            }
            _ => Some(artifact),
        }
    }

    /// Creates an instance of the type behind `handle`.
    pub fn instantiate(&self, handle: TypeHandle, args: Vec<Value>) -> Result<Bridge, BridgeError> {
        let ty = self.context.type_ref(handle)?;
        let type_name = ty.to_string();
        let graph_name = graph_name_of(&ty);

        if let Some(artifact) = self.current_artifact(&type_name, graph_name) {
            let native = artifact.create(args).map_err(BridgeError::Fault)?;
            debug!(ty = %type_name, "instantiated compiled artifact");
            let object = Arc::new(Mutex::new(Object::Native(native)));
            return Ok(Bridge::new(self.interp.clone(), object));
        }

        let not_instantiable = || BridgeError::NotInstantiable {
            type_name: type_name.clone(),
        };
        match self.context.kind(handle) {
            Some(TypeKind::GraphClass) => {}
            Some(TypeKind::GenericInstantiation) => {
                let definition = self
                    .context
                    .generic_definition(handle)
                    .ok_or_else(not_instantiable)?;
                if self.context.kind(definition) != Some(TypeKind::GraphClass) {
                    return Err(not_instantiable());
                }
            }
            _ => return Err(not_instantiable()),
        }
        let object = self.interp.instantiate(&ty, args)?;
        debug!(ty = %type_name, "instantiated interpreted graph");
        Ok(Bridge::new(self.interp.clone(), object))
    }

    pub fn instantiate_type(&self, ty: &SyntheticType, args: Vec<Value>) -> Result<Bridge, BridgeError> {
        let handle = if Arc::ptr_eq(ty.context(), &self.context) {
            ty.handle()
        } else {
            self.context.resolve(&ty.type_ref())
        };
        self.instantiate(handle, args)
    }

    /// Instantiates a type by its canonical full name.
    pub fn instantiate_named(&self, full_name: &str, args: Vec<Value>) -> Result<Bridge, BridgeError> {
        let handle = self
            .context
            .lookup(full_name)
            .ok_or_else(|| ReflectError::Unresolved {
                name: full_name.to_string(),
            })?;
        self.instantiate(handle, args)
    }

    /// Wraps an existing instance value.
    pub fn wrap(&self, value: &Value) -> Result<Bridge, BridgeError> {
        match value.as_object() {
            Some(object) => Ok(Bridge::new(self.interp.clone(), Arc::clone(object))),
            None => Err(BridgeError::NotInstantiable {
                type_name: value.type_name(),
            }),
        }
    }

    /// Runs the configured source generator over a registered graph.
    pub fn generate(&self, graph_name: &str) -> Result<GeneratedSource, BridgeError> {
        let graph = self
            .context
            .graph(graph_name)
            .ok_or_else(|| ReflectError::Unresolved {
                name: graph_name.to_string(),
            })?;
        let generation_error = |message: String| BridgeError::Generation {
            graph: graph_name.to_string(),
            message,
        };
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| generation_error("no source generator configured".into()))?;
        let source = generator.generate(&graph).map_err(generation_error)?;
        let generated = GeneratedSource {
            type_name: generator.type_name(&graph),
            source,
            graph_hash: graph_hash(&graph)?,
        };
        info!(graph = %graph_name, ty = %generated.type_name, "generated source");
        Ok(generated)
    }
}
