// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Closed tag → component table.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::builtin;
use crate::Component;

/// Creates a fresh, unmounted component.
pub type ComponentFactory = Arc<dyn Fn() -> Box<dyn Component> + Send + Sync>;

/// Outcome of looking a tag up.
#[derive(Clone)]
pub enum Resolution {
    /// The tag names a registered component.
    Component(ComponentFactory),
    /// Unknown tag: hydrate as a literal host element with the same props.
    Host,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Component(_) => f.write_str("Component(..)"),
            Resolution::Host => f.write_str("Host"),
        }
    }
}

/// Tag table, fixed once built.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    table: BTreeMap<String, ComponentFactory>,
}

impl ComponentRegistry {
    /// Registry holding only the built-in components.
    pub fn builtin() -> Self {
        Self::builder().with_builtins().build()
    }

    /// Empty builder.
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::default()
    }

    /// Look a tag up. Never fails: unknown tags resolve to [`Resolution::Host`].
    pub fn resolve(&self, tag: &str) -> Resolution {
        self.table
            .get(tag)
            .map_or(Resolution::Host, |f| Resolution::Component(Arc::clone(f)))
    }

    /// Whether `tag` names a registered component.
    pub fn contains(&self, tag: &str) -> bool {
        self.table.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("tags", &self.table.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`ComponentRegistry`].
#[derive(Default)]
pub struct ComponentRegistryBuilder {
    table: BTreeMap<String, ComponentFactory>,
}

impl ComponentRegistryBuilder {
    /// Add `Scene`, `Background`, `RenderParams` and `Group`.
    pub fn with_builtins(self) -> Self {
        self.register(builtin::SCENE, || Box::new(builtin::Scene::default()))
            .register(builtin::BACKGROUND, || {
                Box::new(builtin::Background::default())
            })
            .register(builtin::RENDER_PARAMS, || {
                Box::new(builtin::RenderParams::default())
            })
            .register(builtin::GROUP, || Box::new(builtin::Group))
    }

    /// Map `tag` to a factory; a later registration for the same tag wins.
    pub fn register<F>(mut self, tag: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Component> + Send + Sync + 'static,
    {
        self.table.insert(tag.into(), Arc::new(factory));
        self
    }

    /// Freeze the table.
    pub fn build(self) -> ComponentRegistry {
        ComponentRegistry { table: self.table }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tags_fall_back_to_host() {
        let registry = ComponentRegistry::builtin();
        assert!(matches!(registry.resolve("mesh"), Resolution::Host));
        assert!(matches!(
            registry.resolve(builtin::SCENE),
            Resolution::Component(_)
        ));
    }

    #[test]
    fn builder_can_override_builtins() {
        let registry = ComponentRegistry::builder()
            .with_builtins()
            .register(builtin::GROUP, || Box::new(builtin::Group))
            .register("Panel", || Box::new(builtin::Group))
            .build();
        let tags: Vec<_> = registry.tags().collect();
        assert_eq!(
            tags,
            vec!["Background", "Group", "Panel", "RenderParams", "Scene"]
        );
    }
}
