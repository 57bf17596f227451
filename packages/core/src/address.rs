//! Address type with validated components.

use std::fmt;

/// Errors related to address parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// A component contains characters that are not allowed.
    #[error("invalid address component '{component}' at position {position}: {message}")]
    InvalidComponent {
        component: String,
        position: usize,
        message: String,
    },
}

/// A validated location in a [`GlobalScope`](crate::GlobalScope) or in the
/// shared store's path facade.
///
/// Components are separated by `/`. Each component starts with a letter,
/// an underscore, or a digit, and continues with identifier characters,
/// `-` or `.`, so remote names such as `user-admin` are addressable.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address {
    pub components: Vec<String>,
}

impl Address {
    /// The empty (root) address.
    pub fn root() -> Self {
        Address {
            components: Vec::new(),
        }
    }

    /// Parse an address string, validating components.
    ///
    /// Empty components are ignored, so `//a/b/` equals `a/b`.
    ///
    /// ```rust
    /// use mosaic_core::Address;
    ///
    /// let address = Address::parse("remotes/user-admin").unwrap();
    /// assert_eq!(address.len(), 2);
    /// assert!(Address::parse("remotes/bad name").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let components: Vec<String> = s
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        for (i, component) in components.iter().enumerate() {
            Self::validate_component(component, i)?;
        }

        Ok(Address { components })
    }

    fn validate_component(component: &str, position: usize) -> Result<(), AddressError> {
        let invalid = |message: String| AddressError::InvalidComponent {
            component: component.to_string(),
            position,
            message,
        };

        let mut chars = component.chars();
        let Some(first) = chars.next() else {
            return Err(invalid("empty component".to_string()));
        };

        if !(unicode_ident::is_xid_start(first) || first == '_' || first.is_ascii_digit()) {
            return Err(invalid(
                "must start with a letter, underscore or digit".to_string(),
            ));
        }

        for c in chars {
            if !(unicode_ident::is_xid_continue(c) || c == '-' || c == '.') {
                return Err(invalid(format!("invalid character '{}'", c)));
            }
        }

        Ok(())
    }

    /// Return a new address with one more component.
    pub fn child(&self, component: &str) -> Result<Address, AddressError> {
        Self::validate_component(component, self.components.len())?;
        let mut components = self.components.clone();
        components.push(component.to_string());
        Ok(Address { components })
    }

    /// Join this address with another.
    #[must_use]
    pub fn join(&self, other: &Address) -> Address {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Address { components }
    }

    /// Check if this address has the given prefix.
    pub fn has_prefix(&self, prefix: &Address) -> bool {
        prefix.components.len() <= self.components.len()
            && prefix.components == self.components[..prefix.components.len()]
    }

    /// Strip a prefix, returning the remainder.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &Address) -> Option<Address> {
        self.has_prefix(prefix).then(|| Address {
            components: self.components[prefix.components.len()..].to_vec(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(String::as_str)
    }

    /// Borrow the components as string slices, for `match` routing.
    pub fn segments(&self) -> Vec<&str> {
        self.iter().collect()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("/"))
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

/// Build an address from a literal.
///
/// ```rust
/// use mosaic_core::address;
///
/// let a = address!("tenant/id");
/// assert_eq!(a.len(), 2);
/// ```
#[macro_export]
macro_rules! address {
    ($s:expr) => {
        $crate::Address::parse($s).expect("invalid address literal")
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_normalize() {
        assert!(Address::parse("").unwrap().is_empty());
        assert_eq!(address!("a/b/"), address!("/a//b"));
        assert_eq!(address!("a/b").to_string(), "a/b");
    }

    #[test]
    fn hyphens_dots_and_indices_allowed() {
        assert_eq!(address!("remotes/user-admin").len(), 2);
        assert_eq!(address!("shared/ui.runtime").len(), 2);
        assert_eq!(address!("notifications/0/read").len(), 3);
        assert_eq!(address!("__federation__/containers").len(), 2);
    }

    #[test]
    fn invalid_components_rejected() {
        assert!(Address::parse("a/b c").is_err());
        assert!(Address::parse("a/.hidden").is_err());
        assert!(Address::parse("a/-dash").is_err());
        assert!(Address::parse("a/x?y").is_err());
    }

    #[test]
    fn child_validates() {
        let base = address!("remotes");
        assert_eq!(base.child("users").unwrap(), address!("remotes/users"));
        assert!(base.child("bad/child").is_err());
        assert!(base.child("").is_err());
    }

    #[test]
    fn prefix_handling() {
        let a = address!("tenant/metadata/plan");
        assert!(a.has_prefix(&address!("tenant")));
        assert!(!a.has_prefix(&address!("auth")));
        assert_eq!(
            a.strip_prefix(&address!("tenant")),
            Some(address!("metadata/plan"))
        );
        assert_eq!(a.strip_prefix(&address!("notifications")), None);
    }
}
