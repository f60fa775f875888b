#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end scenarios: compile a string expression against a small
//! host type registry, run the evaluator, and check the result.

use std::sync::Arc;

use predexpr::eval::{eval, parse_guid_text, Env};
use predexpr::queryable::{invoke_lambda, order_by};
use predexpr::{compile_expression, compile_lambda, compile_lambda_multi, compile_ordering, compile_top_level};
use predexpr_ir::{FieldDesc, Reflected, TypeDesc, TypeInfo, TypeKey, TypeRegistry, Value};
use predexpr_parse::{AnonymousClassFactory, Binding, Externals, ParserOptions};

#[derive(Clone)]
struct Profile {
    first_name: String,
    age: i32,
}

impl Reflected for Profile {
    fn type_info() -> TypeInfo {
        TypeInfo::new(TypeKey::new("Profile"))
        .with_field(FieldDesc {
                name: "FirstName".into(),
                ty: TypeDesc::String,
                is_static: false,
                get: Arc::new(|v| Value::String(Arc::from(downcast::<Profile>(v).first_name.as_str()))),
        })
        .with_field(FieldDesc {
                name: "Age".into(),
                ty: TypeDesc::I32,
                is_static: false,
                get: Arc::new(|v| Value::I32(downcast::<Profile>(v).age)),
        })
    }
}

#[derive(Clone)]
struct User {
    id: i32,
    user_name: String,
    profile: Profile,
}

impl Reflected for User {
    fn type_info() -> TypeInfo {
        TypeInfo::new(TypeKey::new("User"))
        .with_field(FieldDesc {
                name: "Id".into(),
                ty: TypeDesc::I32,
                is_static: false,
                get: Arc::new(|v| Value::I32(downcast::<User>(v).id)),
        })
        .with_field(FieldDesc {
                name: "UserName".into(),
                ty: TypeDesc::String,
                is_static: false,
                get: Arc::new(|v| Value::String(Arc::from(downcast::<User>(v).user_name.as_str()))),
        })
        .with_field(FieldDesc {
                name: "Profile".into(),
                ty: TypeDesc::Object(TypeKey::new("Profile")),
                is_static: false,
                get: Arc::new(|v| Value::Object(Arc::new(downcast::<User>(v).profile.clone()))),
        })
    }
}

fn downcast<T: Clone + 'static>(v: &Value) -> T {
    let Value::Object(obj) = v else { panic!("expected an Object value") };
    obj.downcast_ref::<T>().expect("downcast to the registered host type").clone()
}

fn user(id: i32, name: &str, age: i32) -> Value {
    Value::Object(Arc::new(User { id, user_name: name.to_string(), profile: Profile { first_name: name.to_string(), age } }))
}

fn registry() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    types.register::<Profile>();
    types.register::<User>();
    types
}

fn options() -> ParserOptions {
    ParserOptions::default()
}

// Scenario 1: parse_lambda(int, int, "x + 1", [x_param]) applied to 41 -> 42.
#[test]
fn scenario_1_lambda_over_a_named_int_parameter() {
    let types = registry();
    let anon = AnonymousClassFactory::new();
    let parameters = [("x".to_string(), TypeDesc::I32)];
    let lambda = compile_lambda_multi(&parameters, "x + 1", &[], Externals::default(), Some(&TypeDesc::I32), &options(), &types, &anon).unwrap();
    let result = invoke_lambda(&lambda, &[Value::I32(41)], &types).unwrap();
    assert_eq!(result, Value::I32(42));
}

// Scenario 2: items.where("it in (2,4,6,8)") over [1..100] yields [2,4,6,8].
#[test]
fn scenario_2_where_with_an_in_list_predicate() {
    let types = registry();
    let anon = AnonymousClassFactory::new();
    let filter = compile_lambda(
        TypeDesc::I32,
        "it == 2 || it == 4 || it == 6 || it == 8",
        &[],
        Externals::default(),
        Some(&TypeDesc::Bool),
        &options(),
        &types,
        &anon,
    )
    .unwrap();
    let source: Vec<Value> = (1..=100).map(Value::I32).collect();
    let mut kept = Vec::new();
    for item in &source {
        if invoke_lambda(&filter, std::slice::from_ref(item), &types).unwrap() == Value::Bool(true) {
            kept.push(item.clone());
        }
    }
    assert_eq!(kept, vec![Value::I32(2), Value::I32(4), Value::I32(6), Value::I32(8)]);
}

// Scenario 3: items.where("@0.Contains(UserName)", ["A","B","C"]) over users A..E
// yields users A,B,C in input order.
#[test]
fn scenario_3_where_against_a_positional_external_list() {
    let types = registry();
    let anon = AnonymousClassFactory::new();
    let allowed = Value::Array(Arc::new(vec![
                Value::String("A".into()),
                Value::String("B".into()),
                Value::String("C".into()),
    ]));
    let values = [Binding::new(TypeDesc::Array(Box::new(TypeDesc::String)), allowed)];
    let lambda = compile_expression(
        "it",
        TypeDesc::Object(TypeKey::new("User")),
        "@0.Contains(it.UserName)",
        &values,
        Externals::default(),
        Some(&TypeDesc::Bool),
        &options(),
        &types,
        &anon,
    )
    .unwrap();
    let users = vec![user(1, "A", 10), user(2, "B", 20), user(3, "C", 30), user(4, "D", 40), user(5, "E", 50)];
    let mut kept = Vec::new();
    for u in &users {
        let env = Env::new().bind("it", u.clone()).bind("root", u.clone());
        if eval(&lambda, &env, &types).unwrap() == Value::Bool(true) {
            kept.push(u.clone());
        }
    }
    let names: Vec<String> = kept
    .iter()
    .map(|v| {
            let Value::Object(obj) = v else { panic!("expected a User") };
            obj.downcast_ref::<User>().unwrap().user_name.clone()
    })
    .collect();
    assert_eq!(names, vec!["A", "B", "C"]);
}

// Scenario 4: items.select("new(UserName as Name, Profile.FirstName)") produces
// instances of an emitted class where .Name and .FirstName match field-for-field.
#[test]
fn scenario_4_select_into_an_anonymous_projection() {
    let types = registry();
    let anon = AnonymousClassFactory::new();
    let lambda = compile_lambda(
        TypeDesc::Object(TypeKey::new("User")),
        "new(it.UserName as Name, it.Profile.FirstName as FirstName)",
        &[],
        Externals::default(),
        None,
        &options(),
        &types,
        &anon,
    )
    .unwrap();
    let projected = invoke_lambda(&lambda, &[user(1, "Ada", 30)], &types).unwrap();
    let Value::Anonymous(inst) = projected else { panic!("expected an anonymous instance") };
    let name_idx = inst.signature.fields().iter().position(|f| f.name.as_str() == "Name").unwrap();
    let first_name_idx = inst.signature.fields().iter().position(|f| f.name.as_str() == "FirstName").unwrap();
    assert_eq!(inst.values[name_idx], Value::String("Ada".into()));
    assert_eq!(inst.values[first_name_idx], Value::String("Ada".into()));
}

// Scenario 5: tuple(1,"2",3,44,55,66,777,888.8,999.9,1000).Item1
// + tuple("ABC").Item1 -> "1ABC".
#[test]
fn scenario_5_wide_tuple_item_access_and_string_concatenation() {
    let types = registry();
    let anon = AnonymousClassFactory::new();
    let expr = compile_top_level(
        "tuple(1,\"2\",3,44,55,66,777,888.8,999.9,1000).Item1 + tuple(\"ABC\").Item1",
        &[],
        Externals::default(),
        Some(&TypeDesc::String),
        &options(),
        &types,
        &anon,
    )
    .unwrap();
    let result = eval(&expr, &Env::new(), &types).unwrap();
    assert_eq!(result, Value::String("1ABC".into()));
}

// Scenario 6: "22222222-..." == Guid.Parse("{0x...}") -> true.
#[test]
fn scenario_6_guid_literal_equals_hex_list_guid() {
    let types = registry();
    let anon = AnonymousClassFactory::new();
    let expr = compile_top_level(
        "\"22222222-7651-4045-962A-3D44DEE71398\" == Guid.Parse(\"{0x22222222,0x7651,0x4045,{0x96,0x2a,0x3d,0x44,0xde,0xe7,0x13,0x98}}\")",
        &[],
        Externals::default(),
        Some(&TypeDesc::Bool),
        &options(),
        &types,
        &anon,
    )
    .unwrap();
    let result = eval(&expr, &Env::new(), &types).unwrap();
    assert_eq!(result, Value::Bool(true));

    let direct = parse_guid_text("22222222-7651-4045-962A-3D44DEE71398").unwrap();
    let hex = parse_guid_text("{0x22222222,0x7651,0x4045,{0x96,0x2a,0x3d,0x44,0xde,0xe7,0x13,0x98}}").unwrap();
    assert_eq!(direct, hex);
}

// Scenario 7: [10,20,30].select("it << 1") -> [20,40,60]; "it >> 1" -> [5,10,15].
#[test]
fn scenario_7_shift_operators_under_select() {
    let types = registry();
    let anon = AnonymousClassFactory::new();
    let shl = compile_lambda(TypeDesc::I32, "it << 1", &[], Externals::default(), None, &options(), &types, &anon).unwrap();
    let shr = compile_lambda(TypeDesc::I32, "it >> 1", &[], Externals::default(), None, &options(), &types, &anon).unwrap();
    let items = [Value::I32(10), Value::I32(20), Value::I32(30)];
    let left: Vec<Value> = items.iter().map(|v| invoke_lambda(&shl, std::slice::from_ref(v), &types).unwrap()).collect();
    assert_eq!(left, vec![Value::I32(20), Value::I32(40), Value::I32(60)]);
    let items = [Value::I32(10), Value::I32(20), Value::I32(30)];
    let right: Vec<Value> = items.iter().map(|v| invoke_lambda(&shr, std::slice::from_ref(v), &types).unwrap()).collect();
    assert_eq!(right, vec![Value::I32(5), Value::I32(10), Value::I32(15)]);
}

// Scenario 8: parse_ordering(User, "Profile.Age DESC, Id") produces two orderings,
// the first descending.
#[test]
fn scenario_8_ordering_directives_and_the_sort_they_drive() {
    let types = registry();
    let anon = AnonymousClassFactory::new();
    let directives = compile_ordering(
        TypeDesc::Object(TypeKey::new("User")),
        "Profile.Age DESC, Id",
        &[],
        Externals::default(),
        &options(),
        &types,
        &anon,
    )
    .unwrap();
    assert_eq!(directives.len(), 2);
    assert!(!directives[0].ascending);
    assert!(directives[1].ascending);

    let users = vec![user(1, "A", 30), user(2, "B", 30), user(3, "C", 40)];
    let sorted = order_by(users, &directives, &types).unwrap();
    let ids: Vec<i32> = sorted
    .iter()
    .map(|v| {
            let Value::Object(obj) = v else { panic!("expected a User") };
            obj.downcast_ref::<User>().unwrap().id
    })
    .collect();
    assert_eq!(ids, vec![3, 1, 2]);
}

// Scenario 9: `FloatValue * DecimalValue` is ambiguous and must fail to
// compile; `Decimal(FloatValue) * DecimalValue` succeeds once the ambiguity
// is resolved by an explicit conversion.
#[test]
fn scenario_9_incompatible_widening_is_rejected_until_made_explicit() {
    let types = registry_with_numeric_fields();
    let anon = AnonymousClassFactory::new();

    let ambiguous = compile_expression(
        "it",
        TypeDesc::Object(TypeKey::new("Numbers")),
        "FloatValue * DecimalValue",
        &[],
        Externals::default(),
        None,
        &options(),
        &types,
        &anon,
    );
    assert!(ambiguous.is_err());

    let explicit = compile_expression(
        "it",
        TypeDesc::Object(TypeKey::new("Numbers")),
        "Decimal(FloatValue) * DecimalValue",
        &[],
        Externals::default(),
        None,
        &options(),
        &types,
        &anon,
    );
    assert!(explicit.is_ok());
}

#[derive(Clone)]
struct Numbers {
    float_value: f32,
    decimal_value: rust_decimal::Decimal,
}

impl Reflected for Numbers {
    fn type_info() -> TypeInfo {
        TypeInfo::new(TypeKey::new("Numbers"))
        .with_field(FieldDesc {
                name: "FloatValue".into(),
                ty: TypeDesc::F32,
                is_static: false,
                get: Arc::new(|v| Value::F32(downcast::<Numbers>(v).float_value)),
        })
        .with_field(FieldDesc {
                name: "DecimalValue".into(),
                ty: TypeDesc::Decimal,
                is_static: false,
                get: Arc::new(|v| Value::Decimal(downcast::<Numbers>(v).decimal_value)),
        })
    }
}

fn registry_with_numeric_fields() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    types.register::<Numbers>();
    types
}

// Case insensitivity: changing the ASCII case of an
// identifier or keyword leaves the parse result identical.
#[test]
fn case_insensitive_identifiers_parse_identically() {
    let types = registry();
    let anon = AnonymousClassFactory::new();
    let lower = compile_lambda(TypeDesc::Object(TypeKey::new("User")), "it.username", &[], Externals::default(), None, &options(), &types, &anon)
    .unwrap();
    let upper = compile_lambda(TypeDesc::Object(TypeKey::new("User")), "IT.USERNAME", &[], Externals::default(), None, &options(), &types, &anon)
    .unwrap();
    let u = user(1, "Grace", 36);
    assert_eq!(invoke_lambda(&lower, &[u.clone()], &types).unwrap(), invoke_lambda(&upper, &[u], &types).unwrap());
}
