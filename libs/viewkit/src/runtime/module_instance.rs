//! Module Instance - a module's place in the resolved import graph

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::RwLock;

use super::context::{bounded, ResolutionContext};
use super::FactoryError;
use crate::metadata::{BasicProvider, BasicProviderKind, ModuleMeta, ModuleRef, ProviderDef};
use crate::token::{ClassId, Instance, Token};

/// Every global module created during one `create` call. Shared by all
/// module instances of that graph.
pub(crate) type GlobalModules = Arc<RwLock<Vec<Weak<ModuleInstance>>>>;

/// Runtime wrapper of one module.
///
/// Imports and globals are held weakly: the resolution context owns every
/// instance, and the graph may contain back edges.
pub struct ModuleInstance {
    meta: Arc<ModuleMeta>,
    basic: Vec<BasicProvider>,
    imported: RwLock<Vec<Weak<ModuleInstance>>>,
    globals: GlobalModules,
    values: DashMap<Token, Instance>,
}

impl std::fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("class", &self.meta.class)
            .field(
                "imports",
                &self
                    .imported_module_instances()
                    .iter()
                    .map(|m| m.class())
                    .collect::<Vec<_>>(),
            )
            .field("values", &self.values.len())
            .finish()
    }
}

impl ModuleInstance {
    /// Collects the module's basic providers (own declarations plus value
    /// imports) and stores every `use_value` right away.
    pub(crate) fn new(meta: Arc<ModuleMeta>, globals: GlobalModules) -> Self {
        let own = meta.providers.values().filter_map(|p| match p {
            ProviderDef::Basic(b) => Some(b.clone()),
            ProviderDef::Class(_) => None,
        });
        let imported = meta.imports.iter().filter_map(|m| match m {
            ModuleRef::Value(b) if !meta.providers.contains_key(&b.provide) => Some(b.clone()),
            _ => None,
        });
        let basic: Vec<BasicProvider> = own.chain(imported).collect();

        let values = DashMap::new();
        for provider in &basic {
            if let BasicProviderKind::UseValue(v) = &provider.kind {
                values.insert(provider.provide.clone(), v.clone());
            }
        }

        Self {
            meta,
            basic,
            imported: RwLock::new(Vec::new()),
            globals,
            values,
        }
    }

    pub fn class(&self) -> ClassId {
        self.meta.class
    }

    pub fn name(&self) -> &'static str {
        self.meta.class.name()
    }

    pub fn metadata(&self) -> &Arc<ModuleMeta> {
        &self.meta
    }

    pub fn is_global(&self) -> bool {
        self.meta.global
    }

    /// Declared plus value-imported basic providers.
    pub fn basic_providers(&self) -> &[BasicProvider] {
        &self.basic
    }

    /// Tokens this module declares itself: class and basic providers, then
    /// value imports.
    pub fn own_provider_tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.meta
            .providers
            .keys()
            .cloned()
            .chain(
                self.basic
                    .iter()
                    .map(|b| b.provide.clone())
                    .filter(|t| !self.meta.providers.contains_key(t)),
            )
    }

    pub fn exports(&self) -> &IndexSet<Token> {
        &self.meta.exports
    }

    /// Records a direct import. Re-adding a module of the same class is a
    /// no-op.
    pub fn add_imported_module_instance(&self, instance: &Arc<ModuleInstance>) {
        let mut imported = self.imported.write();
        let known = imported
            .iter()
            .filter_map(Weak::upgrade)
            .any(|m| m.class() == instance.class());
        if !known {
            imported.push(Arc::downgrade(instance));
        }
    }

    pub fn imported_module_instances(&self) -> Vec<Arc<ModuleInstance>> {
        self.imported
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Every token visible from inside this module: own providers and
    /// components, exports of direct imports, exports of every global module.
    pub fn providers(&self) -> IndexSet<Token> {
        let mut visible: IndexSet<Token> = self.own_provider_tokens().collect();
        visible.extend(self.meta.components.iter().map(|c| Token::Class(*c)));
        for module in self.imported_module_instances() {
            visible.extend(module.exports().iter().cloned());
        }
        let globals: Vec<_> = self.globals.read().iter().filter_map(Weak::upgrade).collect();
        for module in globals {
            visible.extend(module.exports().iter().cloned());
        }
        visible
    }

    pub fn has_depended_provider_class(&self, token: &Token) -> bool {
        self.providers().contains(token)
    }

    /// Modules whose exports make `token` visible here: direct imports in
    /// declaration order, then global modules.
    pub(crate) fn exporters_of(&self, token: &Token) -> Vec<Arc<ModuleInstance>> {
        let globals: Vec<_> = self.globals.read().iter().filter_map(Weak::upgrade).collect();
        self.imported_module_instances()
            .into_iter()
            .chain(globals)
            .filter(|m| m.class() != self.class() && m.exports().contains(token))
            .collect()
    }

    pub fn declares_basic(&self, token: &Token) -> bool {
        self.basic.iter().any(|b| &b.provide == token)
    }

    pub fn set_value_provider_item(&self, token: Token, value: Instance) {
        self.values.insert(token, value);
    }

    pub fn value_provider_item(&self, token: &Token) -> Option<Instance> {
        self.values.get(token).map(|v| v.value().clone())
    }

    /// Runs this module's `use_factory` providers in declaration order and
    /// stores their values. Already generated tokens are skipped.
    pub(crate) async fn generate_provider_values(
        &self,
        ctx: &ResolutionContext,
        timeout: Option<Duration>,
    ) -> Result<(), FactoryError> {
        for provider in &self.basic {
            let BasicProviderKind::UseFactory { inject, factory } = &provider.kind else {
                continue;
            };
            if self.values.contains_key(&provider.provide) {
                continue;
            }

            let mut args = Vec::with_capacity(inject.len());
            for token in inject {
                args.push(ctx.value_factory_argument(self, &provider.provide, token)?);
            }

            let token = provider.provide.clone();
            let value = bounded(
                timeout,
                || format!("factory of {} in module {}", token, self.name()),
                factory.call(args),
            )
            .await?
            .map_err(|source| FactoryError::ValueFactory {
                token: token.clone(),
                module: self.class(),
                source,
            })?;

            tracing::debug!(module = %self.class(), token = %token, "Provider value generated");
            self.set_value_provider_item(token, value);
        }
        Ok(())
    }
}
