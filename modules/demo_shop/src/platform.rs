use async_trait::async_trait;
use viewkit::{ComponentInstance, ComponentValue, Platform};

/// Markup string a demo component renders to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markup(pub String);

impl Markup {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Adds `data-component="<name>"` to the outermost tag.
    pub fn annotate(&self, name: &str) -> Markup {
        let attr = format!(" data-component=\"{name}\"");
        let s = &self.0;
        let Some(close) = s.find('>').filter(|_| s.starts_with('<')) else {
            return Markup(format!("<!--{name}-->{s}"));
        };
        let at = if s[..close].ends_with('/') { close - 1 } else { close };
        Markup(format!("{}{attr}{}", &s[..at], &s[at..]))
    }
}

/// Presentation hook tagging every ready `Markup` with its component name.
/// Lazy values and foreign renderables pass through untouched.
#[derive(Debug, Default)]
pub struct MarkupPlatform;

#[async_trait]
impl Platform for MarkupPlatform {
    async fn generate_component(
        &self,
        instance: &ComponentInstance,
        value: ComponentValue,
    ) -> anyhow::Result<ComponentValue> {
        match value.downcast_ready::<Markup>() {
            Some(markup) => {
                tracing::trace!(component = instance.name(), "Annotating markup");
                Ok(ComponentValue::ready(markup.annotate(instance.name())))
            }
            None => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotate_self_closing_and_open_tags() {
        assert_eq!(
            Markup::new("<cart/>").annotate("CartPage").as_str(),
            "<cart data-component=\"CartPage\"/>"
        );
        assert_eq!(
            Markup::new("<main class=\"x\"><p/></main>").annotate("Shell").as_str(),
            "<main class=\"x\" data-component=\"Shell\"><p/></main>"
        );
        assert_eq!(
            Markup::new("<a><b/></a>").annotate("A").as_str(),
            "<a data-component=\"A\"><b/></a>"
        );
        assert_eq!(Markup::new("text").annotate("T").as_str(), "<!--T-->text");
    }
}
