//! Internal derive macros for the colorcut solver configuration.
use proc_macro2::Span;
use quote::quote;
use syn::{parse_quote, Data, Expr, Field, Ident, Lit, LitStr, Meta, MetaNameValue};
use synstructure::decl_derive;

/// Doc comment lines of a field, with the leading space removed.
fn doc_lines(field: &Field) -> Vec<LitStr> {
    let mut lines = vec![];
    for attr in field.attrs.iter() {
        if let Ok(Meta::NameValue(MetaNameValue {
            ident,
            lit: Lit::Str(doc_str),
            ..
        })) = attr.parse_meta()
        {
            if ident == "doc" {
                lines.push(doc_str);
            }
        }
    }
    lines
}

/// Derives a default instance from the documentation.
fn derive_doc_default(s: synstructure::Structure) -> proc_macro2::TokenStream {
    let variant = match s.variants() {
        [variant] => variant,
        _ => panic!("DocDefault requires a struct"),
    };

    let default_re = regex::Regex::new(r"\(Default: (.*)\)").unwrap();

    let body = variant.construct(|field, _| {
        let mut default_value: Expr = parse_quote!(Default::default());
        for doc_str in doc_lines(field) {
            if let Some(default_str) = default_re.captures(&doc_str.value()) {
                let default_str = default_str.get(1).unwrap().as_str();
                let default_str = LitStr::new(default_str, doc_str.span());
                default_value = default_str
                    .parse()
                    .expect("error parsing default expression");
            }
        }
        default_value
    });

    s.gen_impl(quote! {
        gen impl Default for @Self {
            fn default() -> Self {
                #body
            }
        }
    })
}

/// Derives a `<Name>Update` struct of optional fields and a `help` text.
///
/// The update type deserializes with serde and rejects unknown fields, so it can be parsed from
/// TOML config files as well as single `key = value` options.
fn derive_config_update(s: synstructure::Structure) -> proc_macro2::TokenStream {
    let ast = s.ast();
    let name = &ast.ident;
    let fields = match &ast.data {
        Data::Struct(data) => data.fields.iter().collect::<Vec<_>>(),
        _ => panic!("ConfigUpdate requires a struct"),
    };

    let update_name = Ident::new(&format!("{}Update", name), Span::call_site());

    let mut help_text = String::new();
    let mut idents = vec![];
    let mut types = vec![];

    for field in fields.iter() {
        let ident = field
            .ident
            .clone()
            .expect("ConfigUpdate requires named fields");
        let ty = &field.ty;
        help_text.push_str(&format!("{}: {}\n", ident, quote!(#ty).to_string()));
        for line in doc_lines(field) {
            help_text.push_str(&format!("    {}\n", line.value().trim()));
        }
        help_text.push('\n');
        idents.push(ident);
        types.push(ty.clone());
    }

    let help_text = LitStr::new(&help_text, Span::call_site());

    let field_decls = idents.iter();
    let field_types = types.iter();
    let merge_a = idents.iter();
    let merge_b = idents.iter();
    let merge_c = idents.iter();
    let apply_a = idents.iter();
    let apply_b = idents.iter();

    quote! {
        /// Partial update of a configuration, every field is optional.
        #[derive(Default, Debug, Clone, serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct #update_name {
            #( pub #field_decls: Option<#field_types>, )*
        }

        impl #update_name {
            /// Create an empty update.
            pub fn new() -> #update_name {
                #update_name::default()
            }

            /// Overwrite the fields present in `other`.
            pub fn merge(&mut self, other: #update_name) {
                #(
                    if other.#merge_a.is_some() {
                        self.#merge_b = other.#merge_c;
                    }
                )*
            }

            /// Write the present fields into a configuration.
            pub fn apply(&self, config: &mut #name) {
                #(
                    if let Some(value) = &self.#apply_a {
                        config.#apply_b = value.clone();
                    }
                )*
            }
        }

        impl #name {
            /// Description of all configuration options.
            pub fn help() -> String {
                String::from(#help_text)
            }
        }
    }
}

decl_derive!([DocDefault] => derive_doc_default);
decl_derive!([ConfigUpdate] => derive_config_update);
