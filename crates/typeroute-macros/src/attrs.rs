//! `#[api(...)]` and `#[serde(...)]` attribute parsing.

use syn::meta::ParseNestedMeta;
use syn::{Attribute, Expr, ExprLit, ExprUnary, Lit, LitStr, Token, UnOp};

/// Container-level attributes.
#[derive(Default)]
pub struct ContainerAttrs {
    /// `#[api(name = "...")]`
    pub name: Option<String>,
    /// `#[api(discriminator = "kind", variant = "cat")]`
    pub discriminator: Option<(String, String)>,
    pub rename_all: Option<RenameRule>,
    /// `#[serde(default)]` on the container
    pub default: bool,
}

/// Field-level attributes.
#[derive(Default)]
pub struct FieldAttrs {
    pub name: Option<String>,
    pub rename: Option<String>,
    pub section: Option<String>,
    pub skip: bool,
    /// `#[serde(skip_serializing)]`: decoded but never encoded
    pub write_only: bool,
    pub required: bool,
    pub default: bool,
    pub flatten: bool,
    pub constraints: Vec<Constraint>,
}

pub enum Constraint {
    Min(f64),
    Max(f64),
    MinLength(usize),
    MaxLength(usize),
    Pattern(String),
    OneOf(Vec<String>),
    Format(String),
    Rules(String),
}

const SECTIONS: [&str; 5] = ["body", "path", "query", "header", "cookie"];

impl ContainerAttrs {
    pub fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();
        let mut variant: Option<String> = None;
        let mut property: Option<String> = None;

        for attr in attrs {
            if attr.path().is_ident("api") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("name") {
                        out.name = Some(string_value(&meta)?);
                    } else if meta.path.is_ident("discriminator") {
                        property = Some(string_value(&meta)?);
                    } else if meta.path.is_ident("variant") {
                        variant = Some(string_value(&meta)?);
                    } else {
                        return Err(meta.error("unsupported api container attribute"));
                    }
                    Ok(())
                })?;
            } else if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename_all") {
                        if meta.input.peek(Token![=]) {
                            let lit = string_value(&meta)?;
                            let rule = RenameRule::parse(&lit)
                                .ok_or_else(|| meta.error(format!("unknown rename rule `{lit}`")))?;
                            out.rename_all = Some(rule);
                        } else {
                            skip_value(&meta)?;
                        }
                    } else if meta.path.is_ident("default") {
                        out.default = true;
                        skip_value(&meta)?;
                    } else {
                        skip_value(&meta)?;
                    }
                    Ok(())
                })?;
            }
        }

        match (property, variant) {
            (Some(p), Some(v)) => out.discriminator = Some((p, v)),
            (None, None) => {}
            _ => {
                return Err(syn::Error::new(
                    proc_macro2::Span::call_site(),
                    "`discriminator` and `variant` must be declared together",
                ))
            }
        }
        Ok(out)
    }
}

impl FieldAttrs {
    pub fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();

        for attr in attrs {
            if attr.path().is_ident("api") {
                attr.parse_nested_meta(|meta| out.api_meta(meta))?;
            } else if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    let path = &meta.path;
                    if path.is_ident("rename") {
                        if meta.input.peek(Token![=]) {
                            out.rename = Some(string_value(&meta)?);
                        } else {
                            skip_value(&meta)?;
                        }
                    } else if path.is_ident("skip") || path.is_ident("skip_deserializing") {
                        out.skip = true;
                    } else if path.is_ident("skip_serializing") {
                        out.write_only = true;
                    } else if path.is_ident("default") {
                        out.default = true;
                        skip_value(&meta)?;
                    } else if path.is_ident("flatten") {
                        out.flatten = true;
                    } else {
                        skip_value(&meta)?;
                    }
                    Ok(())
                })?;
            }
        }
        Ok(out)
    }

    fn api_meta(&mut self, meta: ParseNestedMeta<'_>) -> syn::Result<()> {
        let Some(ident) = meta.path.get_ident().map(|i| i.to_string()) else {
            return Err(meta.error("expected an identifier"));
        };
        match ident.as_str() {
            section if SECTIONS.contains(&section) => self.set_section(&meta, section)?,
            "section" => {
                let section = string_value(&meta)?;
                if !SECTIONS.contains(&section.as_str()) {
                    return Err(meta.error(format!("unknown section `{section}`")));
                }
                self.set_section(&meta, &section)?;
            }
            "name" => self.name = Some(string_value(&meta)?),
            "skip" => self.skip = true,
            "required" => self.required = true,
            "min" => self.constraints.push(Constraint::Min(number_value(&meta)?)),
            "max" => self.constraints.push(Constraint::Max(number_value(&meta)?)),
            "min_length" => self.constraints.push(Constraint::MinLength(count_value(&meta)?)),
            "max_length" => self.constraints.push(Constraint::MaxLength(count_value(&meta)?)),
            "length" => {
                let n = count_value(&meta)?;
                self.constraints.push(Constraint::MinLength(n));
                self.constraints.push(Constraint::MaxLength(n));
            }
            "pattern" => self.constraints.push(Constraint::Pattern(string_value(&meta)?)),
            "format" => self.constraints.push(Constraint::Format(string_value(&meta)?)),
            "one_of" => self.constraints.push(Constraint::OneOf(list_value(&meta)?)),
            "rules" => self.constraints.push(Constraint::Rules(string_value(&meta)?)),
            _ => return Err(meta.error(format!("unsupported api field attribute `{ident}`"))),
        }
        Ok(())
    }

    fn set_section(&mut self, meta: &ParseNestedMeta<'_>, section: &str) -> syn::Result<()> {
        if let Some(existing) = &self.section {
            if existing != section {
                return Err(meta.error(format!("field already declared in `{existing}`")));
            }
        }
        self.section = Some(section.to_string());
        Ok(())
    }
}

fn string_value(meta: &ParseNestedMeta<'_>) -> syn::Result<String> {
    let lit: LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

fn number_value(meta: &ParseNestedMeta<'_>) -> syn::Result<f64> {
    let expr: Expr = meta.value()?.parse()?;
    let (negative, lit) = match &expr {
        Expr::Lit(ExprLit { lit, .. }) => (false, lit),
        Expr::Unary(ExprUnary { op: UnOp::Neg(_), expr, .. }) => match &**expr {
            Expr::Lit(ExprLit { lit, .. }) => (true, lit),
            _ => return Err(syn::Error::new_spanned(&expr, "expected a number")),
        },
        _ => return Err(syn::Error::new_spanned(&expr, "expected a number")),
    };
    let value = match lit {
        Lit::Int(i) => i.base10_parse::<f64>()?,
        Lit::Float(f) => f.base10_parse::<f64>()?,
        _ => return Err(syn::Error::new_spanned(lit, "expected a number")),
    };
    Ok(if negative { -value } else { value })
}

fn count_value(meta: &ParseNestedMeta<'_>) -> syn::Result<usize> {
    let lit: syn::LitInt = meta.value()?.parse()?;
    lit.base10_parse()
}

/// `one_of = ["a", "b"]` or `one_of = "a|b"`.
fn list_value(meta: &ParseNestedMeta<'_>) -> syn::Result<Vec<String>> {
    let expr: Expr = meta.value()?.parse()?;
    match expr {
        Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) => {
            Ok(s.value().split('|').map(|v| v.trim().to_string()).collect())
        }
        Expr::Array(array) => array
            .elems
            .iter()
            .map(|elem| match elem {
                Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) => Ok(s.value()),
                Expr::Lit(ExprLit { lit: Lit::Int(i), .. }) => Ok(i.base10_digits().to_string()),
                other => Err(syn::Error::new_spanned(
                    other,
                    "expected a string or integer literal",
                )),
            })
            .collect(),
        other => Err(syn::Error::new_spanned(other, "expected a list of values")),
    }
}

/// Consume the value of an attribute we do not interpret.
fn skip_value(meta: &ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        let _: Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        let _: proc_macro2::TokenStream = content.parse()?;
    }
    Ok(())
}

/// serde's `rename_all` rules.
#[derive(Clone, Copy)]
pub enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(rule: &str) -> Option<Self> {
        Some(match rule {
            "lowercase" => Self::Lower,
            "UPPERCASE" => Self::Upper,
            "PascalCase" => Self::Pascal,
            "camelCase" => Self::Camel,
            "snake_case" => Self::Snake,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnake,
            "kebab-case" => Self::Kebab,
            "SCREAMING-KEBAB-CASE" => Self::ScreamingKebab,
            _ => return None,
        })
    }

    /// Apply the rule to a snake_case field identifier.
    pub fn apply(self, field: &str) -> String {
        match self {
            Self::Lower | Self::Snake => field.to_string(),
            Self::Upper | Self::ScreamingSnake => field.to_ascii_uppercase(),
            Self::Kebab => field.replace('_', "-"),
            Self::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
            Self::Pascal | Self::Camel => {
                let mut out = String::with_capacity(field.len());
                let mut upper = matches!(self, Self::Pascal);
                for c in field.chars() {
                    if c == '_' {
                        upper = true;
                    } else if upper {
                        out.extend(c.to_uppercase());
                        upper = false;
                    } else {
                        out.push(c);
                    }
                }
                out
            }
        }
    }
}
