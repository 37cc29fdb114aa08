//! The type lattice and assignability relation.

use std::collections::BTreeSet;

use crate::intern::{Interner, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimitiveKind {
    Number,
    String,
    Boolean,
    Null,
    Undefined,
    Any,
    Never,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectProperty {
    pub name: Symbol,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Primitive(PrimitiveKind),
    /// Property names are unique; insertion order is preserved for display.
    Object {
        properties: Vec<ObjectProperty>,
        index_signature: Option<Box<Type>>,
        is_interface: bool,
    },
    Array(Box<Type>),
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    /// Canonical form: deduplicated, no nested unions, at least 2 members.
    Union(Vec<Type>),
    Intersection(Vec<Type>),
    GenericParam {
        name: Symbol,
        constraint: Option<Box<Type>>,
    },
    GenericInstance {
        base_name: Symbol,
        type_args: Vec<Type>,
    },
    Placeholder(Symbol),
}

impl Type {
    pub fn number() -> Type {
        Type::Primitive(PrimitiveKind::Number)
    }
    pub fn string() -> Type {
        Type::Primitive(PrimitiveKind::String)
    }
    pub fn boolean() -> Type {
        Type::Primitive(PrimitiveKind::Boolean)
    }
    pub fn any() -> Type {
        Type::Primitive(PrimitiveKind::Any)
    }
    pub fn never() -> Type {
        Type::Primitive(PrimitiveKind::Never)
    }
    pub fn null() -> Type {
        Type::Primitive(PrimitiveKind::Null)
    }
    pub fn undefined() -> Type {
        Type::Primitive(PrimitiveKind::Undefined)
    }

    /// Builds a canonical union: flattens nested unions, dedups by
    /// structural equality, and collapses to the single member when only
    /// one distinct type remains (`|members| >= 2`).
    pub fn union(members: Vec<Type>) -> Type {
        let mut flat: Vec<Type> = Vec::new();
        for m in members {
            match m {
                Type::Union(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        let mut deduped: Vec<Type> = Vec::new();
        for m in flat {
            if !deduped.iter().any(|existing| existing.equals(&m)) {
                deduped.push(m);
            }
        }
        if deduped.len() == 1 {
            deduped.into_iter().next().unwrap()
        } else {
            Type::Union(deduped)
        }
    }

    /// Structural equality. Union/Intersection equality is multiset-equal
    /// (order-independent).
    pub fn equals(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Primitive(a), Type::Primitive(b)) => a == b,
            (
                Type::Object { properties: p1, index_signature: i1, is_interface: if1 },
                Type::Object { properties: p2, index_signature: i2, is_interface: if2 },
            ) => {
                if if1 != if2 || p1.len() != p2.len() {
                    return false;
                }
                match (i1, i2) {
                    (Some(a), Some(b)) if a.equals(b) => {}
                    (None, None) => {}
                    _ => return false,
                }
                p1.iter().all(|prop| {
                    p2.iter().any(|other_prop| other_prop.name == prop.name && other_prop.ty.equals(&prop.ty))
                })
            }
            (Type::Array(a), Type::Array(b)) => a.equals(b),
            (Type::Function { params: p1, ret: r1 }, Type::Function { params: p2, ret: r2 }) => {
                p1.len() == p2.len() && p1.iter().zip(p2).all(|(a, b)| a.equals(b)) && r1.equals(r2)
            }
            (Type::Union(a), Type::Union(b)) => multiset_equal(a, b),
            (Type::Intersection(a), Type::Intersection(b)) => multiset_equal(a, b),
            (Type::GenericParam { name: n1, .. }, Type::GenericParam { name: n2, .. }) => n1 == n2,
            (
                Type::GenericInstance { base_name: n1, type_args: a1 },
                Type::GenericInstance { base_name: n2, type_args: a2 },
            ) => n1 == n2 && a1.len() == a2.len() && a1.iter().zip(a2).all(|(x, y)| x.equals(y)),
            (Type::Placeholder(a), Type::Placeholder(b)) => a == b,
            _ => false,
        }
    }

    /// `src <= tgt`: is a value of type `src` assignable where `tgt` is
    /// expected? Defined by the lattice rules below.
    pub fn assignable_to(&self, target: &Type) -> bool {
        use PrimitiveKind::*;
        match (self, target) {
            (_, Type::Primitive(Any)) => true,
            (Type::Primitive(Any), _) => true,
            (Type::Primitive(Never), _) => true,
            (Type::Union(members), _) => members.iter().all(|m| m.assignable_to(target)),
            (_, Type::Union(members)) => members.iter().any(|m| self.assignable_to(m)),
            (Type::Intersection(members), _) => members.iter().any(|m| m.assignable_to(target)),
            (_, Type::Intersection(members)) => members.iter().all(|m| self.assignable_to(m)),
            (Type::Primitive(a), Type::Primitive(b)) => a == b,
            (Type::Array(a), Type::Array(b)) => a.assignable_to(b),
            (
                Type::Object { properties: src_props, .. },
                Type::Object { properties: tgt_props, .. },
            ) => tgt_props.iter().all(|tgt_prop| {
                src_props
                    .iter()
                    .find(|p| p.name == tgt_prop.name)
                    .map(|p| p.ty.assignable_to(&tgt_prop.ty))
                    .unwrap_or(false)
            }),
            (
                Type::Function { params: src_params, ret: src_ret },
                Type::Function { params: tgt_params, ret: tgt_ret },
            ) => {
                src_params.len() == tgt_params.len()
                    && tgt_params.iter().zip(src_params).all(|(t, s)| t.assignable_to(s))
                    && src_ret.assignable_to(tgt_ret)
            }
            (
                Type::GenericInstance { base_name: n1, type_args: a1 },
                Type::GenericInstance { base_name: n2, type_args: a2 },
            ) => n1 == n2 && a1.len() == a2.len() && a1.iter().zip(a2).all(|(x, y)| x.equals(y)),
            _ => self.equals(target),
        }
    }

    pub fn clone_deep(&self) -> Type {
        self.clone()
    }

    pub fn display(&self, interner: &Interner) -> String {
        match self {
            Type::Primitive(p) => match p {
                PrimitiveKind::Number => "number".to_string(),
                PrimitiveKind::String => "string".to_string(),
                PrimitiveKind::Boolean => "boolean".to_string(),
                PrimitiveKind::Null => "null".to_string(),
                PrimitiveKind::Undefined => "undefined".to_string(),
                PrimitiveKind::Any => "any".to_string(),
                PrimitiveKind::Never => "never".to_string(),
                PrimitiveKind::Unknown => "unknown".to_string(),
            },
            Type::Array(elem) => format!("{}[]", elem.display(interner)),
            Type::Object { properties, is_interface: _, .. } => {
                let parts: Vec<String> = properties
                    .iter()
                    .map(|p| format!("{}: {}", interner.resolve(p.name), p.ty.display(interner)))
                    .collect();
                format!("{{ {} }}", parts.join(", "))
            }
            Type::Function { params, ret } => {
                let parts: Vec<String> = params.iter().map(|p| p.display(interner)).collect();
                format!("({}) => {}", parts.join(", "), ret.display(interner))
            }
            Type::Union(members) => members.iter().map(|m| m.display(interner)).collect::<Vec<_>>().join(" | "),
            Type::Intersection(members) => {
                members.iter().map(|m| m.display(interner)).collect::<Vec<_>>().join(" & ")
            }
            Type::GenericParam { name, .. } => interner.resolve(*name).to_string(),
            Type::GenericInstance { base_name, type_args } => {
                let parts: Vec<String> = type_args.iter().map(|t| t.display(interner)).collect();
                format!("{}<{}>", interner.resolve(*base_name), parts.join(", "))
            }
            Type::Placeholder(name) => interner.resolve(*name).to_string(),
        }
    }

    /// Removes `Null`/`Undefined` from a top-level union, per the
    /// `x !== null && x !== undefined` narrowing rule.
    pub fn remove_nullish(&self) -> Type {
        match self {
            Type::Union(members) => {
                let remaining: Vec<Type> = members
                    .iter()
                    .filter(|m| {
                        !matches!(m, Type::Primitive(PrimitiveKind::Null) | Type::Primitive(PrimitiveKind::Undefined))
                    })
                    .cloned()
                    .collect();
                match remaining.len() {
                    0 => Type::never(),
                    1 => remaining.into_iter().next().unwrap(),
                    _ => Type::Union(remaining),
                }
            }
            Type::Primitive(PrimitiveKind::Null) | Type::Primitive(PrimitiveKind::Undefined) => Type::never(),
            other => other.clone(),
        }
    }
}

fn multiset_equal(a: &[Type], b: &[Type]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used: BTreeSet<usize> = BTreeSet::new();
    'outer: for item in a {
        for (i, other) in b.iter().enumerate() {
            if !used.contains(&i) && item.equals(other) {
                used.insert(i);
                continue 'outer;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_is_absorbent() {
        assert!(Type::number().assignable_to(&Type::any()));
        assert!(Type::any().assignable_to(&Type::number()));
    }

    #[test]
    fn never_is_initial() {
        assert!(Type::never().assignable_to(&Type::string()));
        assert!(Type::never().assignable_to(&Type::number()));
    }

    #[test]
    fn assignable_is_reflexive() {
        let t = Type::union(vec![Type::number(), Type::string()]);
        assert!(t.assignable_to(&t));
    }

    #[test]
    fn primitive_same_kind_assignable() {
        assert!(Type::number().assignable_to(&Type::number()));
        assert!(!Type::number().assignable_to(&Type::string()));
    }

    #[test]
    fn array_is_covariant() {
        let src = Type::Array(Box::new(Type::number()));
        let tgt = Type::Array(Box::new(Type::union(vec![Type::number(), Type::string()])));
        assert!(src.assignable_to(&tgt));
        assert!(!tgt.assignable_to(&src));
    }

    #[test]
    fn function_is_contravariant_in_params_covariant_in_return() {
        let narrow_param = Type::Function { params: vec![Type::number()], ret: Box::new(Type::number()) };
        let wide_param = Type::Function {
            params: vec![Type::union(vec![Type::number(), Type::string()])],
            ret: Box::new(Type::number()),
        };
        // A function accepting a wider param type is assignable where a
        // narrower-param function is expected (contravariance).
        assert!(wide_param.assignable_to(&narrow_param));
        assert!(!narrow_param.assignable_to(&wide_param));
    }

    #[test]
    fn union_assignable_to_target_iff_every_member_is() {
        let u = Type::union(vec![Type::number(), Type::string()]);
        assert!(!u.assignable_to(&Type::number()));
        assert!(u.assignable_to(&Type::any()));
    }

    #[test]
    fn target_union_assignable_iff_some_member_accepts() {
        let u = Type::union(vec![Type::number(), Type::string()]);
        assert!(Type::number().assignable_to(&u));
        assert!(!Type::boolean().assignable_to(&u));
    }

    #[test]
    fn intersection_assignable_to_target_iff_some_member_is() {
        let i = Type::Intersection(vec![Type::number(), Type::string()]);
        assert!(i.assignable_to(&Type::number()));
        assert!(i.assignable_to(&Type::string()));
        assert!(!i.assignable_to(&Type::boolean()));
    }

    #[test]
    fn union_dedups_and_collapses_singleton() {
        let t = Type::union(vec![Type::number(), Type::number()]);
        assert_eq!(t, Type::number());
    }

    #[test]
    fn union_equality_is_multiset_equal() {
        let a = Type::Union(vec![Type::number(), Type::string()]);
        let b = Type::Union(vec![Type::string(), Type::number()]);
        assert!(a.equals(&b));
    }

    #[test]
    fn equals_implies_mutually_assignable() {
        let a = Type::union(vec![Type::number(), Type::string()]);
        let b = Type::union(vec![Type::string(), Type::number()]);
        assert!(a.equals(&b));
        assert!(a.assignable_to(&b));
        assert!(b.assignable_to(&a));
    }

    #[test]
    fn remove_nullish_collapses_empty_union_to_never() {
        let t = Type::Union(vec![Type::null(), Type::undefined()]);
        assert_eq!(t.remove_nullish(), Type::never());
    }

    #[test]
    fn remove_nullish_leaves_singleton() {
        let t = Type::Union(vec![Type::string(), Type::null()]);
        assert_eq!(t.remove_nullish(), Type::string());
    }

    #[test]
    fn object_width_and_depth_subtyping() {
        let mut interner = Interner::new();
        let name = interner.intern("name");
        let age = interner.intern("age");
        let src = Type::Object {
            properties: vec![
                ObjectProperty { name, ty: Type::string() },
                ObjectProperty { name: age, ty: Type::number() },
            ],
            index_signature: None,
            is_interface: false,
        };
        let tgt = Type::Object {
            properties: vec![ObjectProperty { name, ty: Type::string() }],
            index_signature: None,
            is_interface: false,
        };
        assert!(src.assignable_to(&tgt));
        assert!(!tgt.assignable_to(&src));
    }
}
