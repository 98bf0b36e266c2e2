//! Contract interface descriptors and the typed-argument codec.
//!
//! Descriptors follow the JSON ABI shape emitted by the remote compiler.
//! Arguments arrive as user-typed text, are parsed into [`AbiValue`]s by
//! [`parse_value`], encoded into call data with the standard head/tail
//! layout, and return data is decoded back and rendered by [`format_value`].

use std::fmt;
use std::str::FromStr;

use ethereum_types::{Address, U256};
use keccak_hash::keccak;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, StudioError};

// ─────────────────────────────────────────────────────────
// Interface descriptor
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Function,
    Constructor,
    Event,
    Error,
    Fallback,
    Receive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    #[default]
    Nonpayable,
    Payable,
}

impl StateMutability {
    /// `view` and `pure` methods are executed with a call, never a transaction.
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Pure | Self::View)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pure => "pure",
            Self::View => "view",
            Self::Nonpayable => "nonpayable",
            Self::Payable => "payable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(
        default,
        rename = "internalType",
        skip_serializing_if = "Option::is_none"
    )]
    pub internal_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
}

impl AbiParam {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            internal_type: None,
            indexed: None,
        }
    }
}

/// One method, event or error signature in an interface descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(default, rename = "stateMutability")]
    pub state_mutability: StateMutability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
}

/// Ordered list of signatures exposed by a compiled contract.
pub type InterfaceDescriptor = Vec<AbiEntry>;

impl AbiEntry {
    pub fn input_types(&self) -> Result<Vec<ParamType>> {
        self.inputs.iter().map(|p| p.ty.parse()).collect()
    }

    pub fn output_types(&self) -> Result<Vec<ParamType>> {
        self.outputs.iter().map(|p| p.ty.parse()).collect()
    }

    /// Canonical signature, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> Result<String> {
        let types = self
            .input_types()?
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Ok(format!("{}({types})", self.name))
    }

    pub fn selector(&self) -> Result<[u8; 4]> {
        let hash = keccak(self.signature()?.as_bytes());
        let mut out = [0u8; 4];
        out.copy_from_slice(&hash.as_bytes()[..4]);
        Ok(out)
    }

    pub fn is_read_only(&self) -> bool {
        self.state_mutability.is_read_only()
    }
}

/// Methods a user can invoke from the interface panel.
pub fn callable_methods(descriptor: &[AbiEntry]) -> impl Iterator<Item = &AbiEntry> {
    descriptor.iter().filter(|e| e.kind == EntryKind::Function)
}

// ─────────────────────────────────────────────────────────
// Parameter types
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Uint(usize),
    Int(usize),
    Bool,
    Address,
    FixedBytes(usize),
    Bytes,
    String,
    Array(Box<ParamType>),
    FixedArray(Box<ParamType>, usize),
}

impl ParamType {
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Bytes | Self::String | Self::Array(_) => true,
            Self::FixedArray(inner, _) => inner.is_dynamic(),
            _ => false,
        }
    }

    /// Bytes occupied in the head of an enclosing tuple.
    fn head_size(&self) -> usize {
        match self {
            Self::FixedArray(inner, len) if !inner.is_dynamic() => inner.head_size() * len,
            _ => 32,
        }
    }
}

impl FromStr for ParamType {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(inner) = s.strip_suffix("[]") {
            return Ok(Self::Array(Box::new(inner.parse()?)));
        }
        if let (true, Some(open)) = (s.ends_with(']'), s.rfind('[')) {
            let len = s[open + 1..s.len() - 1]
                .parse::<usize>()
                .map_err(|_| StudioError::abi_parse(s, "invalid array length"))?;
            return Ok(Self::FixedArray(Box::new(s[..open].parse()?), len));
        }

        match s {
            "bool" => Ok(Self::Bool),
            "address" => Ok(Self::Address),
            "string" => Ok(Self::String),
            "bytes" => Ok(Self::Bytes),
            "uint" => Ok(Self::Uint(256)),
            "int" => Ok(Self::Int(256)),
            _ => {
                if let Some(bits) = s.strip_prefix("uint") {
                    Ok(Self::Uint(int_width(s, bits)?))
                } else if let Some(bits) = s.strip_prefix("int") {
                    Ok(Self::Int(int_width(s, bits)?))
                } else if let Some(len) = s.strip_prefix("bytes") {
                    match len.parse::<usize>() {
                        Ok(n) if (1..=32).contains(&n) => Ok(Self::FixedBytes(n)),
                        _ => Err(StudioError::abi_parse(s, "unsupported fixed bytes length")),
                    }
                } else {
                    Err(StudioError::abi_parse(s, "unsupported parameter type"))
                }
            }
        }
    }
}

fn int_width(ty: &str, bits: &str) -> Result<usize> {
    match bits.parse::<usize>() {
        Ok(n) if n % 8 == 0 && (8..=256).contains(&n) => Ok(n),
        _ => Err(StudioError::abi_parse(ty, "unsupported integer width")),
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(bits) => write!(f, "uint{bits}"),
            Self::Int(bits) => write!(f, "int{bits}"),
            Self::Bool => f.write_str("bool"),
            Self::Address => f.write_str("address"),
            Self::FixedBytes(n) => write!(f, "bytes{n}"),
            Self::Bytes => f.write_str("bytes"),
            Self::String => f.write_str("string"),
            Self::Array(inner) => write!(f, "{inner}[]"),
            Self::FixedArray(inner, len) => write!(f, "{inner}[{len}]"),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Values: parsing and formatting
// ─────────────────────────────────────────────────────────

/// A typed argument or return value. `Int` holds the 256-bit two's
/// complement word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Uint(U256),
    Int(U256),
    Bool(bool),
    Address(Address),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<AbiValue>),
}

impl AbiValue {
    /// JSON rendering used for history records: numbers become decimal
    /// strings so no precision is lost.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            other => Value::String(format_value(other)),
        }
    }
}

/// Parse user input for a parameter of the given type.
pub fn parse_value(raw: &str, ty: &ParamType) -> Result<AbiValue> {
    let text = if matches!(ty, ParamType::String) {
        raw
    } else {
        raw.trim()
    };

    match ty {
        ParamType::Array(inner) => Ok(AbiValue::Array(parse_array(text, inner, ty)?)),
        ParamType::FixedArray(inner, len) => {
            let items = parse_array(text, inner, ty)?;
            if items.len() != *len {
                return Err(StudioError::abi_parse(
                    ty,
                    format!("expected {len} elements, got {}", items.len()),
                ));
            }
            Ok(AbiValue::Array(items))
        }
        ParamType::String => Ok(AbiValue::String(text.to_string())),
        _ if text.is_empty() => Err(StudioError::abi_parse(ty, "a value is required")),
        ParamType::Uint(bits) => {
            let value = parse_magnitude(text, ty)?;
            if value.bits() > *bits {
                return Err(StudioError::abi_parse(ty, format!("{text} is out of range")));
            }
            Ok(AbiValue::Uint(value))
        }
        ParamType::Int(bits) => parse_signed(text, *bits, ty).map(AbiValue::Int),
        ParamType::Bool => match text.to_ascii_lowercase().as_str() {
            "true" => Ok(AbiValue::Bool(true)),
            "false" => Ok(AbiValue::Bool(false)),
            _ => Err(StudioError::abi_parse(ty, format!("Invalid boolean value: {text}"))),
        },
        ParamType::Address => parse_address(text).map(AbiValue::Address),
        ParamType::FixedBytes(n) => {
            let bytes = parse_hex(text, ty)?;
            if bytes.len() != *n {
                return Err(StudioError::abi_parse(
                    ty,
                    format!("Invalid {ty} format: {text}"),
                ));
            }
            Ok(AbiValue::FixedBytes(bytes))
        }
        ParamType::Bytes => parse_hex(text, ty).map(AbiValue::Bytes),
    }
}

fn parse_array(text: &str, inner: &ParamType, ty: &ParamType) -> Result<Vec<AbiValue>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let json: Value = serde_json::from_str(text)
        .map_err(|e| StudioError::abi_parse(ty, format!("Invalid array format: {e}")))?;
    let Value::Array(elements) = json else {
        return Err(StudioError::abi_parse(ty, format!("Value must be an array for type {ty}")));
    };
    elements
        .iter()
        .map(|element| {
            let element_text = match element {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            parse_value(&element_text, inner)
        })
        .collect()
}

fn strip_0x(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

fn parse_magnitude(text: &str, ty: &ParamType) -> Result<U256> {
    match strip_0x(text) {
        Some(hex_digits) if !hex_digits.is_empty() && hex_digits.len() <= 64 => {
            U256::from_str_radix(hex_digits, 16)
                .map_err(|_| StudioError::abi_parse(ty, format!("invalid hex number: {text}")))
        }
        Some(_) => Err(StudioError::abi_parse(ty, format!("invalid hex number: {text}"))),
        None if text.chars().all(|c| c.is_ascii_digit()) => U256::from_dec_str(text)
            .map_err(|_| StudioError::abi_parse(ty, format!("{text} is out of range"))),
        None => Err(StudioError::abi_parse(ty, format!("invalid number: {text}"))),
    }
}

fn parse_signed(text: &str, bits: usize, ty: &ParamType) -> Result<U256> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = parse_magnitude(digits, ty)?;
    let limit = U256::one() << (bits - 1);
    let in_range = if negative {
        magnitude <= limit
    } else {
        magnitude < limit
    };
    if !in_range {
        return Err(StudioError::abi_parse(ty, format!("{text} is out of range")));
    }
    Ok(if negative { negate(magnitude) } else { magnitude })
}

fn negate(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn parse_hex(text: &str, ty: &ParamType) -> Result<Vec<u8>> {
    let digits = strip_0x(text)
        .ok_or_else(|| StudioError::abi_parse(ty, format!("Invalid {ty} format: {text}")))?;
    hex::decode(digits)
        .map_err(|_| StudioError::abi_parse(ty, format!("Invalid {ty} format: {text}")))
}

/// Validate an address. All-lowercase and all-uppercase input is accepted
/// as-is; mixed case must carry a valid EIP-55 checksum.
pub fn parse_address(text: &str) -> Result<Address> {
    let invalid = || StudioError::abi_parse("address", format!("Invalid address format: {text}"));
    let digits = strip_0x(text.trim()).ok_or_else(invalid)?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let bytes = hex::decode(digits).map_err(|_| invalid())?;
    let address = Address::from_slice(&bytes);

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum(&address)[2..] != *digits {
        return Err(StudioError::abi_parse("address", format!("Bad address checksum: {text}")));
    }
    Ok(address)
}

/// EIP-55 mixed-case checksum encoding.
pub fn to_checksum(address: &Address) -> String {
    let lower = hex::encode(address.as_bytes());
    let hash = keccak(lower.as_bytes());
    let hash = hash.as_bytes();

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Render a value the way the interface panel displays it and the way
/// [`parse_value`] accepts it back.
pub fn format_value(value: &AbiValue) -> String {
    match value {
        AbiValue::Uint(v) => v.to_string(),
        AbiValue::Int(v) if v.bit(255) => format!("-{}", negate(*v)),
        AbiValue::Int(v) => v.to_string(),
        AbiValue::Bool(b) => b.to_string(),
        AbiValue::Address(a) => to_checksum(a),
        AbiValue::FixedBytes(b) | AbiValue::Bytes(b) => format!("0x{}", hex::encode(b)),
        AbiValue::String(s) => s.clone(),
        AbiValue::Array(_) => value.to_json().to_string(),
    }
}

// ─────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────

/// Selector followed by the encoded arguments.
pub fn encode_call(entry: &AbiEntry, args: &[AbiValue]) -> Result<Vec<u8>> {
    let types = entry.input_types()?;
    if types.len() != args.len() {
        return Err(StudioError::Validation(format!(
            "{} expects {} arguments, got {}",
            entry.name,
            types.len(),
            args.len()
        )));
    }
    let mut data = entry.selector()?.to_vec();
    data.extend(encode_params(&types, args)?);
    Ok(data)
}

pub fn encode_params(types: &[ParamType], values: &[AbiValue]) -> Result<Vec<u8>> {
    let head_len: usize = types.iter().map(ParamType::head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for (ty, value) in types.iter().zip(values) {
        if ty.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            tail.extend(encode_dynamic(ty, value)?);
        } else {
            head.extend(encode_static(ty, value)?);
        }
    }

    head.extend(tail);
    Ok(head)
}

fn encode_static(ty: &ParamType, value: &AbiValue) -> Result<Vec<u8>> {
    match (ty, value) {
        (ParamType::Uint(_), AbiValue::Uint(v)) | (ParamType::Int(_), AbiValue::Int(v)) => {
            Ok(u256_word(*v).to_vec())
        }
        (ParamType::Bool, AbiValue::Bool(b)) => Ok(u256_word(U256::from(u8::from(*b))).to_vec()),
        (ParamType::Address, AbiValue::Address(a)) => {
            let mut word = vec![0u8; 12];
            word.extend_from_slice(a.as_bytes());
            Ok(word)
        }
        (ParamType::FixedBytes(n), AbiValue::FixedBytes(b)) if b.len() == *n => {
            let mut word = b.clone();
            word.resize(32, 0);
            Ok(word)
        }
        (ParamType::FixedArray(inner, len), AbiValue::Array(items)) if items.len() == *len => {
            encode_params(&vec![(**inner).clone(); *len], items)
        }
        _ => Err(mismatch(ty, value)),
    }
}

fn encode_dynamic(ty: &ParamType, value: &AbiValue) -> Result<Vec<u8>> {
    match (ty, value) {
        (ParamType::Bytes, AbiValue::Bytes(b)) => Ok(encode_bytes(b)),
        (ParamType::String, AbiValue::String(s)) => Ok(encode_bytes(s.as_bytes())),
        (ParamType::Array(inner), AbiValue::Array(items)) => {
            let mut out = usize_word(items.len()).to_vec();
            out.extend(encode_params(&vec![(**inner).clone(); items.len()], items)?);
            Ok(out)
        }
        (ParamType::FixedArray(inner, len), AbiValue::Array(items)) if items.len() == *len => {
            encode_params(&vec![(**inner).clone(); *len], items)
        }
        _ => Err(mismatch(ty, value)),
    }
}

fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = usize_word(bytes.len()).to_vec();
    out.extend_from_slice(bytes);
    let padded = bytes.len().div_ceil(32) * 32;
    out.resize(32 + padded, 0);
    out
}

fn mismatch(ty: &ParamType, value: &AbiValue) -> StudioError {
    StudioError::abi_parse(ty, format!("value {} does not match type", format_value(value)))
}

fn u256_word(v: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    v.to_big_endian(&mut word);
    word
}

fn usize_word(n: usize) -> [u8; 32] {
    u256_word(U256::from(n as u64))
}

// ─────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────

/// Decode the return data of a call to `entry`.
pub fn decode_output(entry: &AbiEntry, data: &[u8]) -> Result<Vec<AbiValue>> {
    let types = entry.output_types()?;
    if types.is_empty() {
        return Ok(Vec::new());
    }
    decode_params(&types, data)
}

pub fn decode_params(types: &[ParamType], data: &[u8]) -> Result<Vec<AbiValue>> {
    let mut out = Vec::with_capacity(types.len());
    let mut head = 0usize;

    for ty in types {
        if ty.is_dynamic() {
            let offset = read_len(data, head)?;
            let tail = data
                .get(offset..)
                .ok_or_else(|| StudioError::AbiDecode(format!("offset {offset} out of bounds")))?;
            out.push(decode_dynamic(ty, tail)?);
        } else {
            out.push(decode_static(ty, data, head)?);
        }
        head += ty.head_size();
    }

    Ok(out)
}

fn decode_static(ty: &ParamType, data: &[u8], pos: usize) -> Result<AbiValue> {
    if let ParamType::FixedArray(inner, len) = ty {
        let items = data
            .get(pos..)
            .ok_or_else(|| StudioError::AbiDecode("data too short".into()))?;
        return decode_params(&vec![(**inner).clone(); *len], items).map(AbiValue::Array);
    }

    let w = word(data, pos)?;
    match ty {
        ParamType::Uint(bits) => {
            let v = U256::from_big_endian(w);
            if v.bits() > *bits {
                return Err(StudioError::AbiDecode(format!("value does not fit {ty}")));
            }
            Ok(AbiValue::Uint(v))
        }
        ParamType::Int(_) => Ok(AbiValue::Int(U256::from_big_endian(w))),
        ParamType::Bool => match U256::from_big_endian(w).low_u64() {
            0 if w.iter().all(|b| *b == 0) => Ok(AbiValue::Bool(false)),
            1 if w[..31].iter().all(|b| *b == 0) => Ok(AbiValue::Bool(true)),
            _ => Err(StudioError::AbiDecode("invalid bool word".into())),
        },
        ParamType::Address => Ok(AbiValue::Address(Address::from_slice(&w[12..]))),
        ParamType::FixedBytes(n) => Ok(AbiValue::FixedBytes(w[..*n].to_vec())),
        _ => Err(StudioError::AbiDecode(format!("{ty} is not a static type"))),
    }
}

fn decode_dynamic(ty: &ParamType, tail: &[u8]) -> Result<AbiValue> {
    match ty {
        ParamType::Bytes => read_bytes(tail).map(|b| AbiValue::Bytes(b.to_vec())),
        ParamType::String => {
            let bytes = read_bytes(tail)?;
            String::from_utf8(bytes.to_vec())
                .map(AbiValue::String)
                .map_err(|_| StudioError::AbiDecode("string is not valid UTF-8".into()))
        }
        ParamType::Array(inner) => {
            let len = read_len(tail, 0)?;
            let body = &tail[32..];
            if len.saturating_mul(32) > body.len() {
                return Err(StudioError::AbiDecode(format!("array length {len} exceeds data")));
            }
            decode_params(&vec![(**inner).clone(); len], body).map(AbiValue::Array)
        }
        ParamType::FixedArray(inner, len) => {
            decode_params(&vec![(**inner).clone(); *len], tail).map(AbiValue::Array)
        }
        _ => Err(StudioError::AbiDecode(format!("{ty} is not a dynamic type"))),
    }
}

fn word(data: &[u8], pos: usize) -> Result<&[u8]> {
    data.get(pos..pos + 32)
        .ok_or_else(|| StudioError::AbiDecode("data too short".into()))
}

fn read_len(data: &[u8], pos: usize) -> Result<usize> {
    let v = U256::from_big_endian(word(data, pos)?);
    if v.bits() > 32 {
        return Err(StudioError::AbiDecode(format!("length {v} too large")));
    }
    Ok(v.low_u64() as usize)
}

fn read_bytes(tail: &[u8]) -> Result<&[u8]> {
    let len = read_len(tail, 0)?;
    tail.get(32..32 + len)
        .ok_or_else(|| StudioError::AbiDecode("bytes length exceeds data".into()))
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
