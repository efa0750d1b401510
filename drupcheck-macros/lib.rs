//! Internal macros for drupcheck

extern crate proc_macro;
extern crate proc_macro2;

use quote::quote;

/// Default implementation of [HeapSpace](../drupcheck/memory/trait.HeapSpace.html).
/// Use by adding `#[derive(HeapSpace)]` to your struct.
///
/// The generated implementation sums the heap space of all fields.
#[proc_macro_derive(HeapSpace)]
pub fn heap_space(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast: syn::DeriveInput = syn::parse(input).unwrap();
    let type_name = ast.ident;
    let (impl_generics, type_generics, where_clause) = ast.generics.split_for_impl();
    let block = match ast.data {
        syn::Data::Struct(ref data_struct) => data_struct
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| match &field.ident {
                Some(name) => quote!(self.#name.heap_space()),
                None => {
                    let index = syn::Index::from(i);
                    quote!(self.#index.heap_space())
                }
            })
            .fold(quote!(0), |a, b| quote!(#a + #b)),
        _ => panic!("HeapSpace can only be derived for structs"),
    };
    let implementation = quote!(
        impl #impl_generics
        HeapSpace for #type_name #type_generics #where_clause {
            fn heap_space(&self) -> usize {
                #block
            }
        }
    );
    implementation.into()
}
