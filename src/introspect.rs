//! Purpose: Describe a snippet from its source text for the catalogue.
//! Exports: `describe`, `check_syntax`, `type_name`, `Descriptor`, `ParamFields`.
//! Role: Static analysis over a `syn` syntax tree of one snippet file.
//! Invariants: `describe` never fails; unparsable input yields placeholder fields.
//! Invariants: Dependencies are best-effort: only literal names passed to
//! `invoke`/`invoke_as` inside `execute` are found.
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use syn::ext::IdentExt;
use syn::visit::{self, Visit};
use syn::{
    Attribute, Expr, ExprCall, ExprLit, ExprMethodCall, Fields, FnArg, GenericArgument, Item,
    ItemFn, ItemStruct, Lit, LitStr, Meta, Pat, PathArguments, ReturnType, Signature, Type,
};

use crate::core::error::{Error, ErrorKind};

pub const NO_DOCUMENTATION: &str = "No documentation available";
pub const ANY_TYPE: &str = "Any";
pub const ENTRY_POINT: &str = "execute";

const PARAMS_ARG: &str = "params";
const INVOKE_CALLS: &[&str] = &["invoke", "invoke_as"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    pub name: String,
    pub description: String,
    pub endpoint: String,
    pub params: ParamFields,
    pub return_type: String,
    pub dependencies: Vec<String>,
    pub is_async: bool,
}

impl Descriptor {
    pub fn placeholder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: NO_DOCUMENTATION.to_string(),
            endpoint: String::new(),
            params: ParamFields::default(),
            return_type: ANY_TYPE.to_string(),
            dependencies: Vec::new(),
            is_async: false,
        }
    }
}

/// Param field name to semantic type name, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParamFields(Vec<(String, String)>);

impl ParamFields {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, ty)| ty.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ParamFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, ty) in &self.0 {
            map.serialize_entry(name, ty)?;
        }
        map.end()
    }
}

pub fn check_syntax(source: &str) -> Result<(), Error> {
    syn::parse_file(source).map(|_| ()).map_err(|err| {
        Error::new(ErrorKind::Discovery)
            .with_message(format!("syntax error: {err}"))
            .with_source(err)
    })
}

pub fn describe(name: &str, source: &str) -> Descriptor {
    let mut descriptor = Descriptor::placeholder(name);
    let Ok(file) = syn::parse_file(source) else {
        return descriptor;
    };
    let Some(entry) = entry_point(&file.items) else {
        return descriptor;
    };

    if let Some(doc) = doc_text(&entry.attrs) {
        descriptor.description = doc;
    }
    descriptor.params = params_struct(&file.items, &entry.sig)
        .map(struct_fields)
        .unwrap_or_default();
    descriptor.return_type = return_type_name(&entry.sig.output);
    descriptor.dependencies = dependency_names(entry);
    descriptor.is_async = entry.sig.asyncness.is_some();
    descriptor
}

fn entry_point(items: &[Item]) -> Option<&ItemFn> {
    items.iter().find_map(|item| match item {
        Item::Fn(func) if func.sig.ident == ENTRY_POINT => Some(func),
        _ => None,
    })
}

fn doc_text(attrs: &[Attribute]) -> Option<String> {
    let mut lines = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }
        let Meta::NameValue(pair) = &attr.meta else {
            continue;
        };
        if let Expr::Lit(ExprLit {
            lit: Lit::Str(text),
            ..
        }) = &pair.value
        {
            let line = text.value();
            lines.push(line.strip_prefix(' ').unwrap_or(&line).to_string());
        }
    }
    let doc = lines.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}

fn params_struct<'a>(items: &'a [Item], sig: &Signature) -> Option<&'a ItemStruct> {
    let ty = sig.inputs.iter().find_map(|input| {
        let FnArg::Typed(arg) = input else {
            return None;
        };
        let Pat::Ident(binding) = arg.pat.as_ref() else {
            return None;
        };
        let ident = binding.ident.to_string();
        (ident.trim_start_matches('_') == PARAMS_ARG).then_some(arg.ty.as_ref())
    })?;
    let Type::Path(path) = ty else {
        return None;
    };
    let struct_name = &path.path.segments.last()?.ident;
    items.iter().find_map(|item| match item {
        Item::Struct(decl) if decl.ident == *struct_name => Some(decl),
        _ => None,
    })
}

fn struct_fields(decl: &ItemStruct) -> ParamFields {
    let Fields::Named(named) = &decl.fields else {
        return ParamFields::default();
    };
    let fields = named
        .named
        .iter()
        .filter_map(|field| {
            let ident = field.ident.as_ref()?;
            let name = serde_rename(&field.attrs).unwrap_or_else(|| ident.unraw().to_string());
            Some((name, type_name(&field.ty)))
        })
        .collect();
    ParamFields(fields)
}

fn serde_rename(attrs: &[Attribute]) -> Option<String> {
    let mut renamed = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        // Unrecognised shapes (e.g. `rename(serialize = ..)`) are ignored.
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                renamed = Some(value.value());
            } else if meta.input.peek(syn::Token![=]) {
                let _: Expr = meta.value()?.parse()?;
            }
            Ok(())
        });
    }
    renamed
}

fn return_type_name(output: &ReturnType) -> String {
    match output {
        ReturnType::Default => ANY_TYPE.to_string(),
        ReturnType::Type(_, ty) => match result_ok_type(ty) {
            Some(ok) => type_name(ok),
            None => type_name(ty),
        },
    }
}

fn result_ok_type(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }
    type_args(&segment.arguments).into_iter().next()
}

fn type_args(arguments: &PathArguments) -> Vec<&Type> {
    match arguments {
        PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Render a Rust type as a language-neutral semantic name, e.g.
/// `Vec<Vec<f64>>` as `list[list[float]]` and `Option<String>` as `str | None`.
pub fn type_name(ty: &Type) -> String {
    match ty {
        Type::Path(path) => {
            let Some(segment) = path.path.segments.last() else {
                return ANY_TYPE.to_string();
            };
            let ident = segment.ident.to_string();
            let args = type_args(&segment.arguments);
            match (ident.as_str(), args.as_slice()) {
                ("f32" | "f64", _) => "float".to_string(),
                (
                    "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
                    | "u128" | "usize",
                    _,
                ) => "int".to_string(),
                ("String" | "str" | "char", _) => "str".to_string(),
                ("bool", _) => "bool".to_string(),
                ("Value", _) => ANY_TYPE.to_string(),
                ("Option", [inner]) => format!("{} | None", type_name(inner)),
                ("Result", [ok]) => type_name(ok),
                ("Result", [ok, err]) => format!("{} | {}", type_name(ok), type_name(err)),
                ("Box" | "Arc" | "Rc" | "Cow", [inner]) => type_name(inner),
                ("Vec" | "VecDeque", [inner]) => format!("list[{}]", type_name(inner)),
                ("HashSet" | "BTreeSet", [inner]) => format!("set[{}]", type_name(inner)),
                ("HashMap" | "BTreeMap", [key, value]) => {
                    format!("dict[{}, {}]", type_name(key), type_name(value))
                }
                (_, []) => ident,
                (_, args) => format!("{ident}[{}]", join_types(args.iter().copied())),
            }
        }
        Type::Reference(reference) => type_name(&reference.elem),
        Type::Slice(slice) => format!("list[{}]", type_name(&slice.elem)),
        Type::Array(array) => format!("list[{}]", type_name(&array.elem)),
        Type::Tuple(tuple) if tuple.elems.is_empty() => "None".to_string(),
        Type::Tuple(tuple) => format!("tuple[{}]", join_types(tuple.elems.iter())),
        Type::Paren(inner) => type_name(&inner.elem),
        Type::Group(inner) => type_name(&inner.elem),
        _ => ANY_TYPE.to_string(),
    }
}

fn join_types<'a>(types: impl Iterator<Item = &'a Type>) -> String {
    types.map(type_name).collect::<Vec<_>>().join(", ")
}

fn dependency_names(entry: &ItemFn) -> Vec<String> {
    let mut calls = InvokeCalls::default();
    calls.visit_block(&entry.block);
    calls.names
}

#[derive(Default)]
struct InvokeCalls {
    names: Vec<String>,
}

impl InvokeCalls {
    fn record(&mut self, first_arg: Option<&Expr>) {
        let Some(Expr::Lit(ExprLit {
            lit: Lit::Str(name),
            ..
        })) = first_arg
        else {
            return;
        };
        let name = name.value();
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }
}

impl<'ast> Visit<'ast> for InvokeCalls {
    fn visit_expr_method_call(&mut self, call: &'ast ExprMethodCall) {
        if INVOKE_CALLS.iter().any(|target| call.method == target) {
            self.record(call.args.first());
        }
        visit::visit_expr_method_call(self, call);
    }

    fn visit_expr_call(&mut self, call: &'ast ExprCall) {
        if let Expr::Path(func) = call.func.as_ref() {
            let is_invoke = func
                .path
                .segments
                .last()
                .is_some_and(|segment| INVOKE_CALLS.iter().any(|target| segment.ident == target));
            if is_invoke {
                self.record(call.args.first());
            }
        }
        visit::visit_expr_call(self, call);
    }
}
