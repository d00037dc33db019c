//! `#[inject(...)]` attribute helpers

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, LitStr, Result};

/// The scope a struct declares for itself with `#[inject(...)]`
#[derive(Debug, PartialEq)]
pub(crate) enum ScopeAttr {
    /// No scope attribute
    Unscoped,

    /// `#[inject(singleton)]`
    Singleton,

    /// `#[inject(scope = "name")]`
    Custom(String),
}

impl ScopeAttr {
    /// Reads the scope from the struct attributes.
    ///
    /// Returns an error if the scope is declared more than once
    /// or an unknown option is used.
    pub(super) fn from_attrs(attrs: &[Attribute]) -> Result<Self> {
        let mut scope = ScopeAttr::Unscoped;
        for attr in attrs.iter().filter(|a| a.path().is_ident("inject")) {
            attr.parse_nested_meta(|meta| {
                let parsed = if meta.path.is_ident("singleton") {
                    ScopeAttr::Singleton
                } else if meta.path.is_ident("scope") {
                    let name: LitStr = meta.value()?.parse()?;
                    ScopeAttr::Custom(name.value())
                } else {
                    return Err(meta.error("expected `singleton` or `scope = \"...\"`"));
                };
                if scope != ScopeAttr::Unscoped {
                    return Err(meta.error("scope is declared more than once"));
                }
                scope = parsed;
                Ok(())
            })?;
        }
        Ok(scope)
    }

    /// Converts the scope into a `ScopeTag` expression
    pub(super) fn as_token_stream(&self) -> TokenStream {
        match self {
            ScopeAttr::Unscoped => quote! { ::grove::ScopeTag::Unscoped },
            ScopeAttr::Singleton => quote! { ::grove::ScopeTag::Singleton },
            ScopeAttr::Custom(name) => quote! { ::grove::ScopeTag::custom(#name) },
        }
    }
}

/// Returns `true` if the field is marked `#[inject(default)]`
pub(super) fn is_default(attrs: &[Attribute]) -> Result<bool> {
    let mut default = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("inject")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                default = true;
                Ok(())
            } else {
                Err(meta.error("expected `default`"))
            }
        })?;
    }
    Ok(default)
}
