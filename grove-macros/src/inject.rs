//! Derive macro for constructible shapes

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use attr::{ScopeAttr, is_default};

mod attr;

/// Tuples of up to this many extractors implement `FromInjector`
const MAX_DEPS: usize = 8;

/// Expands a derive-macro for `Inject`
pub(super) fn expand_inject(input: &syn::DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let syn::Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(name, "`Inject` can only be derived for structs"));
    };

    let scope = ScopeAttr::from_attrs(&input.attrs)?.as_token_stream();

    let mut deps = Vec::new();
    let mut bindings = Vec::new();
    let mut inits = Vec::new();
    for (index, field) in data.fields.iter().enumerate() {
        let member = match &field.ident {
            Some(ident) => quote! { #ident },
            None => {
                let index = syn::Index::from(index);
                quote! { #index }
            }
        };
        if is_default(&field.attrs)? {
            inits.push(quote! { #member: ::core::default::Default::default() });
            continue;
        }
        let binding = format_ident!("__dep{}", index);
        let ty = &field.ty;
        deps.push(quote! { #ty });
        inits.push(quote! { #member: #binding });
        bindings.push(binding);
    }

    if deps.len() > MAX_DEPS {
        return Err(syn::Error::new_spanned(
            name,
            format!("`Inject` supports at most {MAX_DEPS} injected fields, use `#[inject(default)]` or group them")
        ));
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::grove::Inject for #name #ty_generics #where_clause {
            type Deps = (#(#deps,)*);

            #[inline]
            fn scope() -> ::grove::ScopeTag {
                #scope
            }

            #[inline]
            fn inject((#(#bindings,)*): Self::Deps) -> ::core::result::Result<Self, ::grove::Error> {
                ::core::result::Result::Ok(Self { #(#inits,)* })
            }
        }
    })
}
