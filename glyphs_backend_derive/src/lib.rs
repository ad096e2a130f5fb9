extern crate proc_macro;

use heck::ToLowerCamelCase;
use quote::{quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Expr, Field, Fields, LitStr};

/// Derive `FromPlist` (and `TryFrom<Plist>`) for a struct with named fields.
///
/// Field attributes, all under `#[plist(...)]`:
///
/// * `rename = "key"`: plist key, defaults to the lowerCamelCase field name
/// * `default` / `default = expr`: value used when the key is missing
/// * `rest`: a `BTreeMap<String, Plist>` receiving every unconsumed key
/// * `always_serialise`: write the field even when it equals its default
#[proc_macro_derive(FromPlist, attributes(plist))]
pub fn derive_from(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;

    let fields = match named_fields(&input.data, &name) {
        Ok(fields) => fields,
        Err(err) => return err.to_compile_error().into(),
    };

    let mut deser = Vec::new();
    let mut rest = None;
    for (field, attrs) in &fields {
        let ident = &field.ident;
        if attrs.rest {
            rest = Some(quote_spanned! {field.span() => #ident: hashmap, });
            continue;
        }
        let key = &attrs.key;
        deser.push(match &attrs.default {
            Some(DefaultValue::Trait) => quote_spanned! {field.span() =>
                #ident: match hashmap.remove(#key) {
                    Some(plist) => crate::from_plist::FromPlist::from_plist(plist)?,
                    None => ::std::default::Default::default(),
                },
            },
            Some(DefaultValue::Expr(expr)) => quote_spanned! {field.span() =>
                #[allow(unused_parens, clippy::double_parens)]
                #ident: match hashmap.remove(#key) {
                    Some(plist) => crate::from_plist::FromPlist::from_plist(plist)?,
                    None => (#expr),
                },
            },
            None => quote_spanned! {field.span() =>
                #ident: crate::from_plist::FromPlistOpt::from_plist_opt(
                    hashmap.remove(#key),
                    #key,
                )?,
            },
        });
    }

    let body = match rest {
        Some(rest) => quote! {
            Ok(#name {
                #( #deser )*
                #rest
            })
        },
        None => quote! {
            let result = #name {
                #( #deser )*
            };
            if !hashmap.is_empty() {
                return Err(crate::from_plist::GlyphsFromPlistError::UnrecognisedFields(
                    hashmap.into_keys().collect(),
                ));
            }
            Ok(result)
        },
    };

    let expanded = quote! {
        impl crate::from_plist::FromPlist for #name {
            fn from_plist(
                plist: crate::plist::Plist,
            ) -> Result<Self, crate::from_plist::GlyphsFromPlistError> {
                let mut hashmap = plist
                    .into_dictionary()
                    .ok_or(crate::from_plist::VariantError("dictionary"))?;
                #body
            }
        }

        impl ::std::convert::TryFrom<crate::plist::Plist> for #name {
            type Error = crate::from_plist::GlyphsFromPlistError;

            fn try_from(plist: crate::plist::Plist) -> Result<Self, Self::Error> {
                crate::from_plist::FromPlist::from_plist(plist)
            }
        }
    };

    proc_macro::TokenStream::from(expanded)
}

#[proc_macro_derive(ToPlist, attributes(plist))]
pub fn derive_to(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;

    let fields = match named_fields(&input.data, &name) {
        Ok(fields) => fields,
        Err(err) => return err.to_compile_error().into(),
    };

    let ser_rest = fields
        .iter()
        .find(|(_, attrs)| attrs.rest)
        .map(|(field, _)| {
            let ident = &field.ident;
            quote_spanned! {field.span() => let mut hashmap = self.#ident; }
        })
        .unwrap_or_else(|| quote! { let mut hashmap = ::std::collections::BTreeMap::new(); });

    let ser = fields.iter().filter(|(_, attrs)| !attrs.rest).map(|(field, attrs)| {
        let ident = &field.ident;
        let ty = &field.ty;
        let key = &attrs.key;
        match (&attrs.default, attrs.always_serialise) {
            (Some(DefaultValue::Trait), false) => quote_spanned! {field.span() =>
                if self.#ident != <#ty as ::std::default::Default>::default() {
                    hashmap.insert(#key.to_string(), crate::to_plist::ToPlist::to_plist(self.#ident));
                }
            },
            (Some(DefaultValue::Expr(expr)), false) => quote_spanned! {field.span() =>
                #[allow(unused_parens, clippy::double_parens)]
                if self.#ident != (#expr) {
                    hashmap.insert(#key.to_string(), crate::to_plist::ToPlist::to_plist(self.#ident));
                }
            },
            _ => quote_spanned! {field.span() =>
                if let Some(plist) = crate::to_plist::ToPlistOpt::to_plist_opt(self.#ident) {
                    hashmap.insert(#key.to_string(), plist);
                }
            },
        }
    });

    let expanded = quote! {
        impl crate::to_plist::ToPlist for #name {
            fn to_plist(self) -> crate::plist::Plist {
                #ser_rest
                #( #ser )*
                crate::plist::Plist::Dictionary(hashmap)
            }
        }
    };
    proc_macro::TokenStream::from(expanded)
}

enum DefaultValue {
    Trait,
    Expr(Expr),
}

struct FieldAttrs {
    key: String,
    rest: bool,
    default: Option<DefaultValue>,
    always_serialise: bool,
}

fn named_fields<'a>(
    data: &'a Data,
    name: &syn::Ident,
) -> syn::Result<Vec<(&'a Field, FieldAttrs)>> {
    let Data::Struct(data) = data else {
        return Err(syn::Error::new(name.span(), "plist derives only support structs"));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new(
            name.span(),
            "plist derives only support named fields",
        ));
    };
    fields
        .named
        .iter()
        .map(|field| Ok((field, field_attrs(field)?)))
        .collect()
}

fn field_attrs(field: &Field) -> syn::Result<FieldAttrs> {
    let name_str = field
        .ident
        .as_ref()
        .map(|ident| ident.to_string())
        .unwrap_or_default();
    let mut attrs = FieldAttrs {
        key: name_str.trim_start_matches("r#").to_lower_camel_case(),
        rest: false,
        default: None,
        always_serialise: false,
    };
    for attr in field.attrs.iter().filter(|attr| is_plist(attr)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.key = lit.value();
            } else if meta.path.is_ident("rest") {
                attrs.rest = true;
            } else if meta.path.is_ident("always_serialise") {
                attrs.always_serialise = true;
            } else if meta.path.is_ident("default") {
                attrs.default = Some(if meta.input.peek(syn::Token![=]) {
                    DefaultValue::Expr(meta.value()?.parse()?)
                } else {
                    DefaultValue::Trait
                });
            } else {
                return Err(meta.error("unsupported plist attribute"));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

fn is_plist(attr: &Attribute) -> bool {
    attr.path().is_ident("plist")
}
