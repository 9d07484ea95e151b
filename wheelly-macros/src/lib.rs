extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::Data;

/// Derive a `Display` impl for a tagged-variant enum that prints the variant's
/// bare name, ignoring any payload. Used for the layer-type tag of
/// [`crate::network::layer::Layer`] and for naming error kinds.
#[proc_macro_derive(EnumToString)]
pub fn derive_enum_to_string(item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as syn::DeriveInput);

    let struct_identifier = &input.ident;

    let mut match_impl = TokenStream2::new();
    match &input.data {
        Data::Enum(syn::DataEnum { variants, .. }) => {
            for f in variants {
                let id = f.ident.clone();
                let id_str = id.to_token_stream().to_string();
                match &f.fields {
                    syn::Fields::Unit => {
                        match_impl.extend(quote! {#struct_identifier::#id => #id_str,
                        });
                    }
                    syn::Fields::Named(_) => {
                        match_impl.extend(quote! {#struct_identifier::#id { .. } => #id_str,
                        });
                    }
                    syn::Fields::Unnamed(_) => {
                        match_impl.extend(quote! {#struct_identifier::#id(..) => #id_str,
                        });
                    }
                }
            }
        }
        _ => panic!("EnumToString can only be derived for enums"),
    }

    quote! {
        #[automatically_derived]
        impl std::fmt::Display for #struct_identifier {
            #[allow(unreachable_patterns)]
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", match &self {
                        #match_impl
                        _ => "unknown",
                    })
            }
        }
    }
    .into()
}
