//! Typed binding of resolved trees onto user records
//!
//! Consumers project a resolved configuration tree onto their own structs
//! by implementing [`ConfigItem`] and pulling members with the loader
//! functions in this module. Loaders convert `Value` payloads through
//! [`FromConfigValue`], apply optional validators, and report missing
//! members, wrong node kinds, wrong JSON types, and validator failures as
//! validation errors naming the offending member. Store counterparts write
//! records back into an object tree through [`ToConfigValue`].

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::error::StrataError;
use crate::name;
use crate::node::{ConfigNode, ObjectNode};
use crate::path::{NodePath, PARENT_SEGMENT};
use crate::result::Result;

/// Conversion from a `Value` payload to a target type.
pub trait FromConfigValue: Sized {
    fn from_config_value(value: &JsonValue) -> std::result::Result<Self, String>;
}

/// Conversion from a target type back to a `Value` payload.
pub trait ToConfigValue {
    fn to_config_value(&self) -> JsonValue;
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

impl FromConfigValue for bool {
    fn from_config_value(value: &JsonValue) -> std::result::Result<Self, String> {
        value
            .as_bool()
            .ok_or_else(|| format!("expected a boolean, got {}", json_type_name(value)))
    }
}

impl FromConfigValue for String {
    fn from_config_value(value: &JsonValue) -> std::result::Result<Self, String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| format!("expected a string, got {}", json_type_name(value)))
    }
}

impl FromConfigValue for f64 {
    fn from_config_value(value: &JsonValue) -> std::result::Result<Self, String> {
        value
            .as_f64()
            .ok_or_else(|| format!("expected a number, got {}", json_type_name(value)))
    }
}

impl FromConfigValue for f32 {
    fn from_config_value(value: &JsonValue) -> std::result::Result<Self, String> {
        f64::from_config_value(value).map(|v| v as f32)
    }
}

macro_rules! impl_from_config_value_signed {
    ($($target:ty),*) => {$(
        impl FromConfigValue for $target {
            fn from_config_value(value: &JsonValue) -> std::result::Result<Self, String> {
                let wide = value
                    .as_i64()
                    .ok_or_else(|| format!("expected an integer, got {}", json_type_name(value)))?;
                <$target>::try_from(wide)
                    .map_err(|_| format!("{wide} is out of range for {}", stringify!($target)))
            }
        }
    )*};
}

macro_rules! impl_from_config_value_unsigned {
    ($($target:ty),*) => {$(
        impl FromConfigValue for $target {
            fn from_config_value(value: &JsonValue) -> std::result::Result<Self, String> {
                let wide = value
                    .as_u64()
                    .ok_or_else(|| format!("expected a non-negative integer, got {}", json_type_name(value)))?;
                <$target>::try_from(wide)
                    .map_err(|_| format!("{wide} is out of range for {}", stringify!($target)))
            }
        }
    )*};
}

impl_from_config_value_signed!(i8, i16, i32, i64, isize);
impl_from_config_value_unsigned!(u8, u16, u32, u64, usize);

impl<T: FromConfigValue> FromConfigValue for Vec<T> {
    fn from_config_value(value: &JsonValue) -> std::result::Result<Self, String> {
        let entries = value
            .as_array()
            .ok_or_else(|| format!("expected an array, got {}", json_type_name(value)))?;
        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                T::from_config_value(entry).map_err(|message| format!("entry {index}: {message}"))
            })
            .collect()
    }
}

impl ToConfigValue for bool {
    fn to_config_value(&self) -> JsonValue {
        JsonValue::Bool(*self)
    }
}

impl ToConfigValue for String {
    fn to_config_value(&self) -> JsonValue {
        JsonValue::String(self.clone())
    }
}

impl ToConfigValue for &str {
    fn to_config_value(&self) -> JsonValue {
        JsonValue::String((*self).to_string())
    }
}

impl ToConfigValue for f64 {
    fn to_config_value(&self) -> JsonValue {
        JsonValue::from(*self)
    }
}

impl ToConfigValue for f32 {
    fn to_config_value(&self) -> JsonValue {
        JsonValue::from(f64::from(*self))
    }
}

macro_rules! impl_to_config_value_int {
    ($($target:ty),*) => {$(
        impl ToConfigValue for $target {
            fn to_config_value(&self) -> JsonValue {
                JsonValue::from(*self)
            }
        }
    )*};
}

impl_to_config_value_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl<T: ToConfigValue> ToConfigValue for Vec<T> {
    fn to_config_value(&self) -> JsonValue {
        JsonValue::Array(self.iter().map(ToConfigValue::to_config_value).collect())
    }
}

/// A record loadable from and storable into an object node.
///
/// `load_parameters` and `store_parameters` enumerate the record's members;
/// `validate` is an optional cross-member hook run by [`ConfigItem::load_from`]
/// after loading succeeds.
pub trait ConfigItem {
    fn load_parameters(&mut self, config: &ObjectNode) -> Result<()>;

    fn store_parameters(&self, config: &mut ObjectNode) -> Result<()>;

    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Load the record and run its validation hook.
    fn load_from(&mut self, config: &ObjectNode) -> Result<()> {
        self.load_parameters(config)?;
        self.validate()
            .map_err(|message| StrataError::validation_error(std::any::type_name::<Self>(), message))
    }

    /// Store the record's members into `config`.
    fn store_into(&self, config: &mut ObjectNode) -> Result<()> {
        self.store_parameters(config)
    }
}

fn member_value<'a>(member: &str, object: &'a ObjectNode) -> Result<&'a JsonValue> {
    let node = object
        .get(member)
        .ok_or_else(|| StrataError::validation_error(member, "missing required member"))?;
    node.as_value().ok_or_else(|| {
        StrataError::validation_error(member, format!("expected a value member, found {}", node.kind()))
    })
}

/// Load a required value member.
pub fn load_required<T: FromConfigValue>(member: &str, object: &ObjectNode) -> Result<T> {
    let value = member_value(member, object)?;
    T::from_config_value(value).map_err(|message| StrataError::validation_error(member, message))
}

/// Load a required value member and apply a validator.
pub fn load_required_validated<T, V>(member: &str, object: &ObjectNode, validator: V) -> Result<T>
where
    T: FromConfigValue,
    V: Fn(&T) -> std::result::Result<(), String>,
{
    let value = load_required(member, object)?;
    validator(&value).map_err(|message| StrataError::validation_error(member, message))?;
    Ok(value)
}

/// Load an optional value member; a missing member is `Ok(None)`.
pub fn load_optional<T: FromConfigValue>(member: &str, object: &ObjectNode) -> Result<Option<T>> {
    if !object.contains(member) {
        return Ok(None);
    }
    load_required(member, object).map(Some)
}

/// Load an optional value member and apply a validator when present.
pub fn load_optional_validated<T, V>(
    member: &str,
    object: &ObjectNode,
    validator: V,
) -> Result<Option<T>>
where
    T: FromConfigValue,
    V: Fn(&T) -> std::result::Result<(), String>,
{
    match load_optional(member, object)? {
        Some(value) => {
            validator(&value).map_err(|message| StrataError::validation_error(member, message))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Validator accepting values in `[min, max]`.
pub fn range_validator<T>(min: T, max: T) -> impl Fn(&T) -> std::result::Result<(), String>
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    move |value| {
        if *value < min || *value > max {
            Err(format!("value {value} is outside the range [{min}, {max}]"))
        } else {
            Ok(())
        }
    }
}

fn member_object<'a>(member: &str, object: &'a ObjectNode) -> Result<&'a ObjectNode> {
    let node = object
        .get(member)
        .ok_or_else(|| StrataError::validation_error(member, "missing required member"))?;
    node.as_object().ok_or_else(|| {
        StrataError::validation_error(member, format!("expected an object member, found {}", node.kind()))
    })
}

/// Load a required sub-record from an object member.
pub fn load_required_item<T: ConfigItem>(
    item: &mut T,
    member: &str,
    object: &ObjectNode,
) -> Result<()> {
    item.load_from(member_object(member, object)?)
}

/// Load an optional sub-record; returns whether the member was present.
pub fn load_optional_item<T: ConfigItem>(
    item: &mut T,
    member: &str,
    object: &ObjectNode,
) -> Result<bool> {
    if !object.contains(member) {
        return Ok(false);
    }
    load_required_item(item, member, object)?;
    Ok(true)
}

fn load_entries<T, F>(member: &str, container: &ObjectNode, mut make: F) -> Result<Vec<(String, T)>>
where
    T: ConfigItem,
    F: FnMut(&str) -> T,
{
    let mut entries = Vec::with_capacity(container.len());
    for (entry_name, child) in container.iter() {
        let sub = child.as_object().ok_or_else(|| {
            StrataError::validation_error(
                format!("{member}/{entry_name}"),
                format!("container entries must be objects, found {}", child.kind()),
            )
        })?;
        let mut item = make(entry_name);
        item.load_from(sub)?;
        entries.push((entry_name.to_string(), item));
    }
    Ok(entries)
}

/// Load a required container member into a sequence, consuming entries in
/// the container's insertion order. `make` constructs each record from its
/// member name.
pub fn load_required_sequence<T, F>(member: &str, object: &ObjectNode, make: F) -> Result<Vec<T>>
where
    T: ConfigItem,
    F: FnMut(&str) -> T,
{
    let container = member_object(member, object)?;
    Ok(load_entries(member, container, make)?
        .into_iter()
        .map(|(_, item)| item)
        .collect())
}

/// Load an optional container member into a sequence.
pub fn load_optional_sequence<T, F>(
    member: &str,
    object: &ObjectNode,
    make: F,
) -> Result<Option<Vec<T>>>
where
    T: ConfigItem,
    F: FnMut(&str) -> T,
{
    if !object.contains(member) {
        return Ok(None);
    }
    load_required_sequence(member, object, make).map(Some)
}

/// Load a required container member into a map keyed by member name.
pub fn load_required_map<T, F>(
    member: &str,
    object: &ObjectNode,
    make: F,
) -> Result<IndexMap<String, T>>
where
    T: ConfigItem,
    F: FnMut(&str) -> T,
{
    let container = member_object(member, object)?;
    Ok(load_entries(member, container, make)?.into_iter().collect())
}

/// Load an optional container member into a map keyed by member name.
pub fn load_optional_map<T, F>(
    member: &str,
    object: &ObjectNode,
    make: F,
) -> Result<Option<IndexMap<String, T>>>
where
    T: ConfigItem,
    F: FnMut(&str) -> T,
{
    if !object.contains(member) {
        return Ok(None);
    }
    load_required_map(member, object, make).map(Some)
}

fn upsert(object: &mut ObjectNode, member: &str, node: ConfigNode) -> Result<()> {
    if object.contains(member) {
        object.replace(member, node)
    } else {
        object.insert(member, node)
    }
}

/// Store a value member, overwriting an existing member of the same name.
pub fn store_value<T: ToConfigValue>(value: &T, member: &str, object: &mut ObjectNode) -> Result<()> {
    name::validate(member)?;
    upsert(object, member, ConfigNode::Value(value.to_config_value()))
}

/// Store a sub-record as an object member.
pub fn store_item<T: ConfigItem>(item: &T, member: &str, object: &mut ObjectNode) -> Result<()> {
    name::validate(member)?;
    let mut sub = ObjectNode::new();
    item.store_into(&mut sub)?;
    upsert(object, member, ConfigNode::Object(sub))
}

/// Store a keyed container of sub-records.
pub fn store_map<T: ConfigItem>(
    map: &IndexMap<String, T>,
    member: &str,
    object: &mut ObjectNode,
) -> Result<()> {
    name::validate(member)?;
    let mut container = ObjectNode::new();
    for (entry_name, item) in map {
        store_item(item, entry_name, &mut container)?;
    }
    upsert(object, member, ConfigNode::Object(container))
}

/// Walk to the parent of `path`'s final member, creating intermediate
/// objects, and hand back the parent together with the final member name.
/// Traversal through an existing non-object and an occupied final position
/// are collisions.
fn store_slot<'a, 'p>(
    path: &'p NodePath,
    root: &'a mut ObjectNode,
) -> Result<(&'a mut ObjectNode, &'p str)> {
    if path.is_alias() {
        return Err(StrataError::path_error(
            path.to_string(),
            "cannot store through an alias path",
        ));
    }
    let (last, parents) = path.segments().split_last().ok_or_else(|| {
        StrataError::path_error(path.to_string(), "cannot store at the root itself")
    })?;
    if parents.first().map(String::as_str) == Some(PARENT_SEGMENT) {
        return Err(StrataError::path_error(
            path.to_string(),
            "store paths must walk downward",
        ));
    }

    let mut cursor = root;
    for segment in parents {
        if !cursor.contains(segment) {
            cursor.insert(segment.as_str(), ConfigNode::Object(ObjectNode::new()))?;
        }
        cursor = cursor
            .get_mut(segment)
            .and_then(ConfigNode::as_object_mut)
            .ok_or_else(|| {
                StrataError::parse_error(format!(
                    "cannot store at '{path}': member '{segment}' is not an object"
                ))
            })?;
    }
    if cursor.contains(last) {
        return Err(StrataError::parse_error(format!(
            "cannot store at '{path}': member '{last}' already exists"
        )));
    }
    Ok((cursor, last))
}

/// Store a value at a path, creating intermediate objects.
///
/// Any existing member along the path that is not an object, and any
/// existing member at the final position, is a collision and fails without
/// modifying that slot.
pub fn store_value_at_path<T: ToConfigValue>(
    value: &T,
    path: &NodePath,
    root: &mut ObjectNode,
) -> Result<()> {
    let (parent, member) = store_slot(path, root)?;
    parent.insert(member, ConfigNode::Value(value.to_config_value()))
}

/// Store a full record at a path, creating intermediate objects. Collision
/// rules match [`store_value_at_path`]. The record is serialized before any
/// slot is touched, so a failing `store_parameters` leaves `root` unchanged.
pub fn store_item_at_path<T: ConfigItem>(
    item: &T,
    path: &NodePath,
    root: &mut ObjectNode,
) -> Result<()> {
    let mut sub = ObjectNode::new();
    item.store_into(&mut sub)?;
    let (parent, member) = store_slot(path, root)?;
    parent.insert(member, ConfigNode::Object(sub))
}

/// Walk downward to the object at `path`. `Ok(None)` means nothing is there;
/// a node of any other kind at the final position is a validation error.
/// The root path (and the empty relative path) addresses `root` itself.
fn item_object_at_path<'a>(path: &NodePath, root: &'a ObjectNode) -> Result<Option<&'a ObjectNode>> {
    if path.is_alias() {
        return Err(StrataError::path_error(
            path.to_string(),
            "cannot load through an alias path",
        ));
    }
    if path.segments().first().map(String::as_str) == Some(PARENT_SEGMENT) {
        return Err(StrataError::path_error(
            path.to_string(),
            "load paths must walk downward",
        ));
    }
    if path.segments().is_empty() {
        return Ok(Some(root));
    }
    let Some(node) = root.node_at(path) else {
        return Ok(None);
    };
    match node.as_object() {
        Some(object) => Ok(Some(object)),
        None => Err(StrataError::validation_error(
            path.to_string(),
            format!("expected an object at this path, found {}", node.kind()),
        )),
    }
}

/// Load a record from the object at `path`. Missing node, a non-object node
/// at the target, or a failing load are all errors.
pub fn load_required_item_at_path<T: ConfigItem>(
    item: &mut T,
    path: &NodePath,
    root: &ObjectNode,
) -> Result<()> {
    let object = item_object_at_path(path, root)?.ok_or_else(|| {
        StrataError::validation_error(path.to_string(), "no node at this path")
    })?;
    item.load_from(object)
}

/// Load a record from the object at `path` when one is there; returns
/// whether it was. A node of the wrong kind at the target is still an error.
pub fn load_optional_item_at_path<T: ConfigItem>(
    item: &mut T,
    path: &NodePath,
    root: &ObjectNode,
) -> Result<bool> {
    match item_object_at_path(path, root)? {
        Some(object) => {
            item.load_from(object)?;
            Ok(true)
        }
        None => Ok(false),
    }
}
