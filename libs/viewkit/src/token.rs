//! Identity of registered types and injection keys.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A live, type-erased provider instance or basic-provider value.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Identity of a module, provider or component type.
///
/// Equality and hashing only look at the `TypeId`; the type name is carried
/// along for diagnostics.
#[derive(Clone, Copy)]
pub struct ClassId {
    type_id: TypeId,
    type_name: &'static str,
}

impl ClassId {
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name, e.g. `demo_shop::catalog::CatalogService`.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Last path segment of the type name, e.g. `CatalogService`.
    pub fn name(&self) -> &'static str {
        short_type_name(self.type_name)
    }
}

/// Strips the module path while leaving generic arguments alone.
fn short_type_name(full: &'static str) -> &'static str {
    let head_end = full.find('<').unwrap_or(full.len());
    match full[..head_end].rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

impl PartialEq for ClassId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ClassId {}

impl Hash for ClassId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shorthand for [`ClassId::of`].
pub fn class<T: Any>() -> ClassId {
    ClassId::of::<T>()
}

/// Injection key: a type, or a named value such as `"api.base_url"`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Class(ClassId),
    Name(Cow<'static, str>),
}

impl Token {
    pub fn of<T: Any>() -> Self {
        Token::Class(ClassId::of::<T>())
    }

    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Token::Name(name.into())
    }

    pub fn as_class(&self) -> Option<ClassId> {
        match self {
            Token::Class(c) => Some(*c),
            Token::Name(_) => None,
        }
    }
}

impl From<ClassId> for Token {
    fn from(c: ClassId) -> Self {
        Token::Class(c)
    }
}

impl From<&'static str> for Token {
    fn from(s: &'static str) -> Self {
        Token::Name(Cow::Borrowed(s))
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::Name(Cow::Owned(s))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Class(c) => f.write_str(c.name()),
            Token::Name(n) => write!(f, "'{n}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;
    #[allow(dead_code)]
    struct Wrapper<T>(T);

    #[test]
    fn class_id_uses_short_names() {
        assert_eq!(class::<Plain>().name(), "Plain");
        assert!(class::<Plain>().type_name().ends_with("tests::Plain"));
        assert!(class::<Wrapper<Plain>>().name().starts_with("Wrapper<"));
    }

    #[test]
    fn class_tokens_compare_by_type() {
        assert_eq!(Token::of::<Plain>(), Token::Class(class::<Plain>()));
        assert_ne!(Token::of::<Plain>(), Token::of::<Wrapper<Plain>>());
        assert_eq!(Token::from("api.url"), Token::named(String::from("api.url")));
    }

    #[test]
    fn token_display() {
        assert_eq!(Token::of::<Plain>().to_string(), "Plain");
        assert_eq!(Token::from("locale").to_string(), "'locale'");
    }
}
