//! Capability Descriptor Table
//!
//! An exposed object declares its script-visible surface up front: which
//! methods exist (and whether they return a value) and which properties can
//! be read or written. The table maps `(member, CallKind)` to the closure that
//! performs the call on the host object, together with the value types the
//! coercion layer needs.
//!
//! ```ignore
//! impl Exposed for Player {
//!     fn capabilities() -> BridgeResult<CapabilityTable<Self>> {
//!         CapabilityTable::builder()
//!             .method("setTitle", |p: &Player, (title,): (String,)| p.set_title(title))
//!             .method_with_return("add", |_, (a, b): (i32, i32)| a + b)
//!             .property("volume", |p| p.volume(), |p, v: f64| p.set_volume(v))
//!             .build()
//!     }
//! }
//! ```

use super::protocol::CallKind;
use crate::core::error::{BridgeError, BridgeResult, CoercionError, CoercionResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Script-side names the stub reserves for itself
pub const RESERVED_MEMBERS: &[&str] = &["__callbacks", "__newCallbackId", "__send"];

/// Integer widths the coercion layer narrows to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntWidth {
    pub fn min(self) -> i128 {
        match self {
            IntWidth::I8 => i8::MIN as i128,
            IntWidth::I16 => i16::MIN as i128,
            IntWidth::I32 => i32::MIN as i128,
            IntWidth::I64 => i64::MIN as i128,
            IntWidth::U8 | IntWidth::U16 | IntWidth::U32 | IntWidth::U64 => 0,
        }
    }

    pub fn max(self) -> i128 {
        match self {
            IntWidth::I8 => i8::MAX as i128,
            IntWidth::I16 => i16::MAX as i128,
            IntWidth::I32 => i32::MAX as i128,
            IntWidth::I64 => i64::MAX as i128,
            IntWidth::U8 => u8::MAX as i128,
            IntWidth::U16 => u16::MAX as i128,
            IntWidth::U32 => u32::MAX as i128,
            IntWidth::U64 => u64::MAX as i128,
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            IntWidth::U8 | IntWidth::U16 | IntWidth::U32 | IntWidth::U64
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            IntWidth::I8 => "i8",
            IntWidth::I16 => "i16",
            IntWidth::I32 => "i32",
            IntWidth::I64 => "i64",
            IntWidth::U8 => "u8",
            IntWidth::U16 => "u16",
            IntWidth::U32 => "u32",
            IntWidth::U64 => "u64",
        }
    }
}

/// The type a parameter or property expects
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    /// No conversion, the raw decoded value
    Any,
    Bool,
    Int(IntWidth),
    Float,
    Text,
    Uuid,
    Enumeration {
        name: &'static str,
        members: &'static [&'static str],
    },
    Nullable(Box<ValueType>),
    List(Box<ValueType>),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => f.write_str("any"),
            ValueType::Bool => f.write_str("bool"),
            ValueType::Int(width) => f.write_str(width.name()),
            ValueType::Float => f.write_str("float"),
            ValueType::Text => f.write_str("string"),
            ValueType::Uuid => f.write_str("uuid"),
            ValueType::Enumeration { name, .. } => write!(f, "enum {}", name),
            ValueType::Nullable(inner) => write!(f, "{}?", inner),
            ValueType::List(inner) => write!(f, "[{}]", inner),
        }
    }
}

/// A Rust type that can cross the bridge as a parameter or property value
pub trait BridgeType: DeserializeOwned {
    fn value_type() -> ValueType;
}

macro_rules! impl_bridge_type {
    ($($ty:ty => $value_type:expr),* $(,)?) => {
        $(
            impl BridgeType for $ty {
                fn value_type() -> ValueType {
                    $value_type
                }
            }
        )*
    };
}

impl_bridge_type! {
    bool => ValueType::Bool,
    i8 => ValueType::Int(IntWidth::I8),
    i16 => ValueType::Int(IntWidth::I16),
    i32 => ValueType::Int(IntWidth::I32),
    i64 => ValueType::Int(IntWidth::I64),
    u8 => ValueType::Int(IntWidth::U8),
    u16 => ValueType::Int(IntWidth::U16),
    u32 => ValueType::Int(IntWidth::U32),
    u64 => ValueType::Int(IntWidth::U64),
    f32 => ValueType::Float,
    f64 => ValueType::Float,
    String => ValueType::Text,
    Uuid => ValueType::Uuid,
    Value => ValueType::Any,
}

impl<T: BridgeType> BridgeType for Option<T> {
    fn value_type() -> ValueType {
        ValueType::Nullable(Box::new(T::value_type()))
    }
}

impl<T: BridgeType> BridgeType for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::List(Box::new(T::value_type()))
    }
}

/// Deserialize an already coerced value into its Rust type
pub(crate) fn from_value<T: BridgeType>(value: Value) -> CoercionResult<T> {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(v) => Ok(v),
        Err(_) => Err(CoercionError::Mismatch {
            expected: T::value_type().to_string(),
            found: value.to_string(),
        }),
    }
}

/// A positional argument list, implemented for tuples of `BridgeType`
pub trait Arguments: Sized {
    fn parameter_types() -> Vec<ValueType>;
    fn from_values(values: Vec<Value>) -> CoercionResult<Self>;
}

macro_rules! impl_arguments {
    ($($ty:ident),*) => {
        impl<$($ty: BridgeType),*> Arguments for ($($ty,)*) {
            fn parameter_types() -> Vec<ValueType> {
                vec![$($ty::value_type()),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn from_values(values: Vec<Value>) -> CoercionResult<Self> {
                let mut values = values.into_iter();
                Ok(($(from_value::<$ty>(values.next().unwrap_or(Value::Null))?,)*))
            }
        }
    };
}

impl_arguments!();
impl_arguments!(A);
impl_arguments!(A, B);
impl_arguments!(A, B, C);
impl_arguments!(A, B, C, D);
impl_arguments!(A, B, C, D, E);
impl_arguments!(A, B, C, D, E, F);
impl_arguments!(A, B, C, D, E, F, G);
impl_arguments!(A, B, C, D, E, F, G, H);

type Invoker<T> = Arc<dyn Fn(&T, Vec<Value>) -> BridgeResult<Value> + Send + Sync>;
type Reader<T> = Arc<dyn Fn(&T) -> BridgeResult<Value> + Send + Sync>;
type Writer<T> = Arc<dyn Fn(&T, Value) -> BridgeResult<()> + Send + Sync>;

/// One callable/readable/writable member
pub enum CapabilityDescriptor<T> {
    InvokeVoid {
        parameters: Vec<ValueType>,
        invoke: Invoker<T>,
    },
    InvokeWithReturn {
        parameters: Vec<ValueType>,
        invoke: Invoker<T>,
    },
    ReadProperty {
        value_type: ValueType,
        read: Reader<T>,
    },
    WriteProperty {
        value_type: ValueType,
        write: Writer<T>,
    },
}

impl<T> CapabilityDescriptor<T> {
    pub fn kind(&self) -> CallKind {
        match self {
            CapabilityDescriptor::InvokeVoid { .. } => CallKind::InvokeVoid,
            CapabilityDescriptor::InvokeWithReturn { .. } => CallKind::InvokeWithReturn,
            CapabilityDescriptor::ReadProperty { .. } => CallKind::ReadProperty,
            CapabilityDescriptor::WriteProperty { .. } => CallKind::WriteProperty,
        }
    }

    /// Types the call's `parameters` are coerced against, in order
    pub fn parameter_types(&self) -> &[ValueType] {
        match self {
            CapabilityDescriptor::InvokeVoid { parameters, .. }
            | CapabilityDescriptor::InvokeWithReturn { parameters, .. } => parameters,
            CapabilityDescriptor::ReadProperty { .. } => &[],
            CapabilityDescriptor::WriteProperty { value_type, .. } => {
                std::slice::from_ref(value_type)
            }
        }
    }

    /// Perform the call with already coerced arguments
    ///
    /// Returns the reply value for the kinds that owe one.
    pub fn call(&self, target: &T, arguments: Vec<Value>) -> BridgeResult<Option<Value>> {
        match self {
            CapabilityDescriptor::InvokeVoid { invoke, .. } => {
                invoke(target, arguments)?;
                Ok(None)
            }
            CapabilityDescriptor::InvokeWithReturn { invoke, .. } => {
                invoke(target, arguments).map(Some)
            }
            CapabilityDescriptor::ReadProperty { read, .. } => read(target).map(Some),
            CapabilityDescriptor::WriteProperty { write, .. } => {
                let value = arguments.into_iter().next().unwrap_or(Value::Null);
                write(target, value)?;
                Ok(None)
            }
        }
    }
}

impl<T> fmt::Debug for CapabilityDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("kind", &self.kind())
            .field("parameters", &self.parameter_types())
            .finish()
    }
}

/// What the stub generator needs to know about a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSchema {
    pub name: String,
    pub kind: MemberKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method { arity: usize, returns: bool },
    Property { readable: bool, writable: bool },
}

/// Immutable `(member, kind) -> descriptor` map for one exposed type
pub struct CapabilityTable<T> {
    descriptors: HashMap<(String, CallKind), CapabilityDescriptor<T>>,
    schema: Vec<MemberSchema>,
}

impl<T: Send + Sync + 'static> CapabilityTable<T> {
    pub fn builder() -> CapabilityTableBuilder<T> {
        CapabilityTableBuilder::new()
    }
}

impl<T> CapabilityTable<T> {
    pub fn get(&self, member: &str, kind: CallKind) -> Option<&CapabilityDescriptor<T>> {
        self.descriptors.get(&(member.to_string(), kind))
    }

    /// Members in declaration order
    pub fn schema(&self) -> &[MemberSchema] {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl<T> fmt::Debug for CapabilityTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityTable")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Builder for `CapabilityTable`
///
/// Entries are collected as declared; `build` checks the schema.
pub struct CapabilityTableBuilder<T> {
    entries: Vec<(String, CapabilityDescriptor<T>)>,
}

impl<T: Send + Sync + 'static> CapabilityTableBuilder<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Method without a return value (`InvokeVoid`)
    pub fn method<A, F>(self, name: &str, f: F) -> Self
    where
        A: Arguments,
        F: Fn(&T, A) + Send + Sync + 'static,
    {
        self.try_method(name, move |target: &T, args: A| -> Result<(), BridgeError> {
            f(target, args);
            Ok(())
        })
    }

    /// Fallible method without a return value
    pub fn try_method<A, E, F>(mut self, name: &str, f: F) -> Self
    where
        A: Arguments,
        E: fmt::Display,
        F: Fn(&T, A) -> Result<(), E> + Send + Sync + 'static,
    {
        let member = name.to_string();
        let invoke: Invoker<T> = Arc::new(move |target, values| {
            let args = A::from_values(values)?;
            f(target, args).map_err(|e| invocation_error(&member, e))?;
            Ok(Value::Null)
        });
        self.entries.push((
            name.to_string(),
            CapabilityDescriptor::InvokeVoid {
                parameters: A::parameter_types(),
                invoke,
            },
        ));
        self
    }

    /// Method whose result is sent back to the script (`InvokeWithReturn`)
    pub fn method_with_return<A, R, F>(self, name: &str, f: F) -> Self
    where
        A: Arguments,
        R: Serialize,
        F: Fn(&T, A) -> R + Send + Sync + 'static,
    {
        self.try_method_with_return(name, move |target: &T, args: A| -> Result<R, BridgeError> {
            Ok(f(target, args))
        })
    }

    /// Fallible method whose result is sent back to the script
    ///
    /// An `Err` rejects the script-side promise with the error's text.
    pub fn try_method_with_return<A, R, E, F>(mut self, name: &str, f: F) -> Self
    where
        A: Arguments,
        R: Serialize,
        E: fmt::Display,
        F: Fn(&T, A) -> Result<R, E> + Send + Sync + 'static,
    {
        let member = name.to_string();
        let invoke: Invoker<T> = Arc::new(move |target, values| {
            let args = A::from_values(values)?;
            let result = f(target, args).map_err(|e| invocation_error(&member, e))?;
            to_json(&result)
        });
        self.entries.push((
            name.to_string(),
            CapabilityDescriptor::InvokeWithReturn {
                parameters: A::parameter_types(),
                invoke,
            },
        ));
        self
    }

    /// Readable and writable property
    pub fn property<V, R, G, S>(self, name: &str, get: G, set: S) -> Self
    where
        V: BridgeType,
        R: Serialize,
        G: Fn(&T) -> R + Send + Sync + 'static,
        S: Fn(&T, V) + Send + Sync + 'static,
    {
        self.getter(name, get).setter(name, set)
    }

    /// Read-only property (`ReadProperty`)
    pub fn getter<R, G>(mut self, name: &str, get: G) -> Self
    where
        R: Serialize,
        G: Fn(&T) -> R + Send + Sync + 'static,
    {
        let read: Reader<T> = Arc::new(move |target| to_json(&get(target)));
        self.entries.push((
            name.to_string(),
            CapabilityDescriptor::ReadProperty {
                value_type: ValueType::Any,
                read,
            },
        ));
        self
    }

    /// Write-only property (`WriteProperty`)
    pub fn setter<V, S>(mut self, name: &str, set: S) -> Self
    where
        V: BridgeType,
        S: Fn(&T, V) + Send + Sync + 'static,
    {
        let write: Writer<T> = Arc::new(move |target, value| {
            set(target, from_value::<V>(value)?);
            Ok(())
        });
        self.entries.push((
            name.to_string(),
            CapabilityDescriptor::WriteProperty {
                value_type: V::value_type(),
                write,
            },
        ));
        self
    }

    /// Validate and freeze the table
    ///
    /// Fails on empty or reserved member names, on the same `(member, kind)`
    /// declared twice, and on a name used both as method and property.
    pub fn build(self) -> BridgeResult<CapabilityTable<T>> {
        let mut descriptors = HashMap::new();
        let mut schema: Vec<MemberSchema> = Vec::new();

        for (name, descriptor) in self.entries {
            if name.trim().is_empty() {
                return Err(BridgeError::InvalidSchema(
                    "member name must not be empty".to_string(),
                ));
            }
            if RESERVED_MEMBERS.contains(&name.as_str()) {
                return Err(BridgeError::InvalidSchema(format!(
                    "member name '{}' is reserved",
                    name
                )));
            }

            let member_kind = descriptor_member_kind(&descriptor);
            match schema.iter().position(|m| m.name == name) {
                None => schema.push(MemberSchema {
                    name: name.clone(),
                    kind: member_kind,
                }),
                Some(index) => {
                    // a getter and a setter may share a name, nothing else may
                    let merged = match (schema[index].kind, member_kind) {
                        (
                            MemberKind::Property { readable, writable },
                            MemberKind::Property {
                                readable: r,
                                writable: w,
                            },
                        ) if !(readable && r) && !(writable && w) => MemberKind::Property {
                            readable: readable || r,
                            writable: writable || w,
                        },
                        _ => {
                            return Err(BridgeError::InvalidSchema(format!(
                                "member '{}' declared more than once",
                                name
                            )))
                        }
                    };
                    schema[index].kind = merged;
                }
            }

            descriptors.insert((name, descriptor.kind()), descriptor);
        }

        Ok(CapabilityTable {
            descriptors,
            schema,
        })
    }
}

impl<T: Send + Sync + 'static> Default for CapabilityTableBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn descriptor_member_kind<T>(descriptor: &CapabilityDescriptor<T>) -> MemberKind {
    match descriptor {
        CapabilityDescriptor::InvokeVoid { parameters, .. } => MemberKind::Method {
            arity: parameters.len(),
            returns: false,
        },
        CapabilityDescriptor::InvokeWithReturn { parameters, .. } => MemberKind::Method {
            arity: parameters.len(),
            returns: true,
        },
        CapabilityDescriptor::ReadProperty { .. } => MemberKind::Property {
            readable: true,
            writable: false,
        },
        CapabilityDescriptor::WriteProperty { .. } => MemberKind::Property {
            readable: false,
            writable: true,
        },
    }
}

fn invocation_error(member: &str, error: impl fmt::Display) -> BridgeError {
    BridgeError::Invocation {
        member: member.to_string(),
        reason: error.to_string(),
    }
}

fn to_json<R: Serialize>(value: &R) -> BridgeResult<Value> {
    serde_json::to_value(value).map_err(|e| BridgeError::Serialization(e.to_string()))
}

/// A host type that can be exposed to scripts
pub trait Exposed: Send + Sync + Sized + 'static {
    /// The statically declared script-visible surface of the type
    fn capabilities() -> BridgeResult<CapabilityTable<Self>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counter {
        value: Mutex<i64>,
        label: Mutex<String>,
    }

    fn counter_table() -> CapabilityTable<Counter> {
        CapabilityTable::builder()
            .method("add", |c: &Counter, (n,): (i64,)| {
                *c.value.lock().unwrap() += n;
            })
            .method_with_return("get", |c: &Counter, (): ()| *c.value.lock().unwrap())
            .try_method_with_return("divide", |c: &Counter, (d,): (i64,)| {
                if d == 0 {
                    Err("division by zero")
                } else {
                    Ok(*c.value.lock().unwrap() / d)
                }
            })
            .property(
                "label",
                |c: &Counter| c.label.lock().unwrap().clone(),
                |c: &Counter, v: String| *c.label.lock().unwrap() = v,
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_table_lookup_by_kind() {
        let table = counter_table();
        assert_eq!(table.len(), 5);
        assert!(table.get("add", CallKind::InvokeVoid).is_some());
        assert!(table.get("add", CallKind::InvokeWithReturn).is_none());
        assert!(table.get("get", CallKind::InvokeWithReturn).is_some());
        assert!(table.get("label", CallKind::ReadProperty).is_some());
        assert!(table.get("label", CallKind::WriteProperty).is_some());
        assert!(table.get("missing", CallKind::InvokeVoid).is_none());
    }

    #[test]
    fn test_schema_order_and_kinds() {
        let table = counter_table();
        let names: Vec<_> = table.schema().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["add", "get", "divide", "label"]);
        assert_eq!(
            table.schema()[0].kind,
            MemberKind::Method {
                arity: 1,
                returns: false
            }
        );
        assert_eq!(
            table.schema()[3].kind,
            MemberKind::Property {
                readable: true,
                writable: true
            }
        );
    }

    #[test]
    fn test_descriptor_call() {
        let table = counter_table();
        let counter = Counter::default();

        let add = table.get("add", CallKind::InvokeVoid).unwrap();
        assert_eq!(add.parameter_types(), &[ValueType::Int(IntWidth::I64)]);
        assert_eq!(add.call(&counter, vec![json!(5)]).unwrap(), None);

        let get = table.get("get", CallKind::InvokeWithReturn).unwrap();
        assert_eq!(get.call(&counter, vec![]).unwrap(), Some(json!(5)));

        let write = table.get("label", CallKind::WriteProperty).unwrap();
        write.call(&counter, vec![json!("hello")]).unwrap();
        let read = table.get("label", CallKind::ReadProperty).unwrap();
        assert_eq!(read.call(&counter, vec![]).unwrap(), Some(json!("hello")));
    }

    #[test]
    fn test_fallible_method_reports_invocation_error() {
        let table = counter_table();
        let counter = Counter::default();
        let divide = table.get("divide", CallKind::InvokeWithReturn).unwrap();

        let err = divide.call(&counter, vec![json!(0)]).unwrap_err();
        assert_eq!(
            err,
            BridgeError::Invocation {
                member: "divide".to_string(),
                reason: "division by zero".to_string()
            }
        );
    }

    #[test]
    fn test_argument_mismatch_is_coercion_error() {
        let table = counter_table();
        let counter = Counter::default();
        let add = table.get("add", CallKind::InvokeVoid).unwrap();
        let err = add.call(&counter, vec![json!("five")]).unwrap_err();
        assert!(matches!(err, BridgeError::Coercion(CoercionError::Mismatch { .. })));
    }

    #[test]
    fn test_missing_arguments_become_null() {
        let table: CapabilityTable<Counter> = CapabilityTable::builder()
            .method_with_return("echo", |_: &Counter, (v,): (Option<String>,)| v)
            .build()
            .unwrap();
        let echo = table.get("echo", CallKind::InvokeWithReturn).unwrap();
        assert_eq!(
            echo.call(&Counter::default(), vec![]).unwrap(),
            Some(Value::Null)
        );
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let result: BridgeResult<CapabilityTable<Counter>> = CapabilityTable::builder()
            .method("add", |_: &Counter, (): ()| {})
            .method_with_return("add", |_: &Counter, (): ()| 1)
            .build();
        assert!(matches!(result, Err(BridgeError::InvalidSchema(_))));

        let result: BridgeResult<CapabilityTable<Counter>> = CapabilityTable::builder()
            .getter("value", |_: &Counter| 1)
            .getter("value", |_: &Counter| 2)
            .build();
        assert!(matches!(result, Err(BridgeError::InvalidSchema(_))));

        let result: BridgeResult<CapabilityTable<Counter>> = CapabilityTable::builder()
            .method("value", |_: &Counter, (): ()| {})
            .getter("value", |_: &Counter| 2)
            .build();
        assert!(matches!(result, Err(BridgeError::InvalidSchema(_))));
    }

    #[test]
    fn test_reserved_member_rejected() {
        let result: BridgeResult<CapabilityTable<Counter>> = CapabilityTable::builder()
            .method("__callbacks", |_: &Counter, (): ()| {})
            .build();
        assert!(matches!(result, Err(BridgeError::InvalidSchema(_))));
    }

    #[test]
    fn test_value_type_display() {
        assert_eq!(ValueType::Int(IntWidth::U32).to_string(), "u32");
        assert_eq!(<Option<Vec<String>>>::value_type().to_string(), "[string]?");
        assert_eq!(Uuid::value_type(), ValueType::Uuid);
    }
}
