//! Composite column names
//!
//! Multi-part keys are stored as composite names: an ordered list of
//! components, each followed by a one-byte boundary marker. The marker is
//! what makes prefix slicing work. A prefix ending in `Exact` sorts before
//! every name that extends it, a prefix ending in `AfterPrefix` sorts after
//! all of them, and `BeforePrefix` sorts before the exact prefix itself.
//!
//! ## Wire format
//!
//! Per component, concatenated:
//!
//! ```text
//! [len: u16 big-endian][bytes: len][marker: u8]
//! ```
//!
//! Markers are compared as signed bytes: `0xFF` (-1) < `0x00` < `0x01`.
//!
//! ## Ordering
//!
//! Components are compared left to right. Value bytes compare as unsigned
//! lexicographic byte strings, then markers compare as signed bytes. When
//! all shared components are equal, the shorter name sorts first.

use byteorder::{BigEndian, ByteOrder};
use std::cmp::Ordering;

use crate::entity::KeyValue;
use crate::error::{Error, Result};
use crate::meta::{KeyLayout, PropertyMeta};
use crate::value::{Value, ValueCodec};

/// Largest component a composite can carry
pub const MAX_COMPONENT_LEN: usize = u16::MAX as usize;

// ============================================================================
// Boundary
// ============================================================================

/// Boundary marker written after a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    /// Sorts before every name sharing the prefix, the exact prefix included
    BeforePrefix,
    /// The component matches exactly
    Exact,
    /// Sorts after every name sharing the prefix
    AfterPrefix,
}

impl Boundary {
    /// Marker byte on the wire
    pub fn as_byte(&self) -> u8 {
        match self {
            Boundary::BeforePrefix => 0xFF,
            Boundary::Exact => 0x00,
            Boundary::AfterPrefix => 0x01,
        }
    }

    /// Parse a marker byte
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0xFF => Ok(Boundary::BeforePrefix),
            0x00 => Ok(Boundary::Exact),
            0x01 => Ok(Boundary::AfterPrefix),
            other => Err(Error::malformed(format!(
                "unknown boundary marker 0x{:02x}",
                other
            ))),
        }
    }

    fn signed(&self) -> i8 {
        self.as_byte() as i8
    }
}

// ============================================================================
// CompositeColumnName
// ============================================================================

/// One component of a composite name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeComponent {
    bytes: Vec<u8>,
    boundary: Boundary,
}

impl CompositeComponent {
    /// Create a component; fails when `bytes` does not fit the length prefix
    pub fn new(bytes: Vec<u8>, boundary: Boundary) -> Result<Self> {
        if bytes.len() > MAX_COMPONENT_LEN {
            return Err(Error::serialization(format!(
                "composite component of {} bytes exceeds {} bytes",
                bytes.len(),
                MAX_COMPONENT_LEN
            )));
        }
        Ok(Self { bytes, boundary })
    }

    /// Serialized component value
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Boundary marker
    pub fn boundary(&self) -> Boundary {
        self.boundary
    }
}

/// Ordered list of components with boundary markers
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CompositeColumnName {
    components: Vec<CompositeComponent>,
}

impl CompositeColumnName {
    /// Empty name
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from components
    pub fn from_components(components: Vec<CompositeComponent>) -> Self {
        Self { components }
    }

    /// Components in order
    pub fn components(&self) -> &[CompositeComponent] {
        &self.components
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True when there is no component
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Append a component
    pub fn push(&mut self, bytes: Vec<u8>, boundary: Boundary) -> Result<()> {
        self.components.push(CompositeComponent::new(bytes, boundary)?);
        Ok(())
    }

    /// Append an `Exact` component and return the extended name
    pub fn with_component(mut self, bytes: Vec<u8>) -> Result<Self> {
        self.push(bytes, Boundary::Exact)?;
        Ok(self)
    }

    /// Remove and return the last component
    pub fn pop(&mut self) -> Option<CompositeComponent> {
        self.components.pop()
    }

    /// Wire encoding
    pub fn encode(&self) -> Vec<u8> {
        let size = self.components.iter().map(|c| c.bytes.len() + 3).sum();
        let mut out = Vec::with_capacity(size);
        let mut len = [0u8; 2];
        for component in &self.components {
            // Length is bounded by CompositeComponent::new
            BigEndian::write_u16(&mut len, component.bytes.len() as u16);
            out.extend_from_slice(&len);
            out.extend_from_slice(&component.bytes);
            out.push(component.boundary.as_byte());
        }
        out
    }

    /// Decode a wire encoding
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut components = Vec::new();
        for raw in RawComponents::new(bytes) {
            let (value, marker) = raw?;
            components.push(CompositeComponent {
                bytes: value.to_vec(),
                boundary: Boundary::from_byte(marker)?,
            });
        }
        Ok(Self { components })
    }

    /// Deserialize component values with the given codecs, in order
    pub fn values(&self, codecs: &[ValueCodec]) -> Result<Vec<Value>> {
        if codecs.len() != self.components.len() {
            return Err(Error::malformed(format!(
                "expected {} components, found {}",
                codecs.len(),
                self.components.len()
            )));
        }
        self.components
            .iter()
            .zip(codecs)
            .map(|(component, codec)| codec.deserialize(&component.bytes))
            .collect()
    }
}

impl Ord for CompositeColumnName {
    fn cmp(&self, other: &Self) -> Ordering {
        let left = self.components.iter().map(|c| (c.bytes.as_slice(), c.boundary.signed()));
        let right = other
            .components
            .iter()
            .map(|c| (c.bytes.as_slice(), c.boundary.signed()));
        compare_components(left, right)
    }
}

impl PartialOrd for CompositeColumnName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shared comparator over (value bytes, signed marker) sequences
fn compare_components<'a, L, R>(mut left: L, mut right: R) -> Ordering
where
    L: Iterator<Item = (&'a [u8], i8)>,
    R: Iterator<Item = (&'a [u8], i8)>,
{
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some((a, ea)), Some((b, eb))) => {
                let ord = a.cmp(b).then(ea.cmp(&eb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Zero-copy walk over encoded components
struct RawComponents<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> RawComponents<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }
}

impl<'a> Iterator for RawComponents<'a> {
    type Item = Result<(&'a [u8], u8)>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.bytes[self.pos..];
        if rest.is_empty() {
            return None;
        }
        if rest.len() < 2 {
            self.pos = self.bytes.len();
            return Some(Err(Error::malformed("truncated length prefix")));
        }
        let len = BigEndian::read_u16(&rest[..2]) as usize;
        if rest.len() < 2 + len {
            self.pos = self.bytes.len();
            return Some(Err(Error::malformed(format!(
                "component length {} overruns buffer of {} bytes",
                len,
                rest.len() - 2
            ))));
        }
        if rest.len() < 3 + len {
            self.pos = self.bytes.len();
            return Some(Err(Error::malformed("missing boundary marker")));
        }
        self.pos += 3 + len;
        Some(Ok((&rest[2..2 + len], rest[2 + len])))
    }
}

// ============================================================================
// CompositeKeyCodec
// ============================================================================

/// Start and end of a slice, `None` meaning unbounded on that side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceBounds {
    /// Where iteration starts (the larger bound when reversed)
    pub start: Option<CompositeColumnName>,
    /// Where iteration ends (the smaller bound when reversed)
    pub end: Option<CompositeColumnName>,
}

/// Builds composite names from key values and key metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositeKeyCodec;

impl CompositeKeyCodec {
    /// Create a codec
    pub fn new() -> Self {
        CompositeKeyCodec
    }

    /// Encode a full key: every component present, every marker `Exact`
    pub fn build_exact<K>(&self, meta: &PropertyMeta, key: Option<&K>) -> Result<CompositeColumnName>
    where
        K: KeyValue + ?Sized,
    {
        let key = key.ok_or_else(|| Error::invalid_key(meta.name(), "key value is null"))?;
        let values = key.decompose();

        match meta.layout() {
            KeyLayout::Single(codec) => {
                let value = single_value(meta, values)?;
                let mut name = CompositeColumnName::new();
                name.push(codec.serialize(&value)?, Boundary::Exact)?;
                Ok(name)
            }
            KeyLayout::Multi(multi) => {
                if values.len() != multi.len() {
                    return Err(Error::invalid_key(
                        meta.name(),
                        format!(
                            "expected {} components, got {}",
                            multi.len(),
                            values.len()
                        ),
                    ));
                }
                let mut name = CompositeColumnName::new();
                for (index, (value, component)) in
                    values.iter().zip(multi.components()).enumerate()
                {
                    if value.is_null() {
                        return Err(Error::invalid_key(
                            meta.name(),
                            format!("component {} ('{}') is null", index, component.name),
                        ));
                    }
                    name.push(component.codec.serialize(value)?, Boundary::Exact)?;
                }
                Ok(name)
            }
        }
    }

    /// Encode a leading prefix of a key for use as one slice bound
    ///
    /// Components up to the last non-null one are encoded; all but the
    /// last get `Exact`, the last gets `boundary`. An absent key, or one
    /// whose components are all null, yields `None` (unbounded).
    pub fn build_partial<K>(
        &self,
        meta: &PropertyMeta,
        key: Option<&K>,
        boundary: Boundary,
    ) -> Result<Option<CompositeColumnName>>
    where
        K: KeyValue + ?Sized,
    {
        let Some(key) = key else {
            return Ok(None);
        };
        let values = key.decompose();

        match meta.layout() {
            KeyLayout::Single(codec) => {
                let value = single_value(meta, values)?;
                let mut name = CompositeColumnName::new();
                name.push(codec.serialize(&value)?, boundary)?;
                Ok(Some(name))
            }
            KeyLayout::Multi(multi) => {
                if values.len() > multi.len() {
                    return Err(Error::invalid_key(
                        meta.name(),
                        format!(
                            "at most {} components allowed, got {}",
                            multi.len(),
                            values.len()
                        ),
                    ));
                }
                let Some(last) = last_present_index(meta, &values)? else {
                    return Ok(None);
                };

                let mut name = CompositeColumnName::new();
                for (index, (value, component)) in values[..=last]
                    .iter()
                    .zip(multi.components())
                    .enumerate()
                {
                    let marker = if index == last { boundary } else { Boundary::Exact };
                    name.push(component.codec.serialize(value)?, marker)?;
                }
                Ok(Some(name))
            }
        }
    }

    /// Encode both ends of a slice
    ///
    /// Inclusivity and direction are turned into boundary markers by
    /// [`CompositeKeyCodec::boundaries`].
    pub fn build_range<K>(
        &self,
        meta: &PropertyMeta,
        start: Option<&K>,
        inclusive_start: bool,
        end: Option<&K>,
        inclusive_end: bool,
        reverse: bool,
    ) -> Result<SliceBounds>
    where
        K: KeyValue + ?Sized,
    {
        let (start_boundary, end_boundary) =
            Self::boundaries(inclusive_start, inclusive_end, reverse);
        Ok(SliceBounds {
            start: self.build_partial(meta, start, start_boundary)?,
            end: self.build_partial(meta, end, end_boundary)?,
        })
    }

    /// Markers for the start and end bounds of a slice
    ///
    /// A lower bound is `Exact` when inclusive and `AfterPrefix` when
    /// exclusive. An upper bound is `AfterPrefix` when inclusive and
    /// `BeforePrefix` when exclusive. Reversed slices start at the upper
    /// bound.
    pub fn boundaries(inclusive_start: bool, inclusive_end: bool, reverse: bool) -> (Boundary, Boundary) {
        let lower = |inclusive: bool| {
            if inclusive {
                Boundary::Exact
            } else {
                Boundary::AfterPrefix
            }
        };
        let upper = |inclusive: bool| {
            if inclusive {
                Boundary::AfterPrefix
            } else {
                Boundary::BeforePrefix
            }
        };
        if reverse {
            (upper(inclusive_start), lower(inclusive_end))
        } else {
            (lower(inclusive_start), upper(inclusive_end))
        }
    }

    /// Wire-encode a name
    pub fn encode(&self, name: &CompositeColumnName) -> Vec<u8> {
        name.encode()
    }

    /// Decode a wire encoding
    pub fn decode(&self, bytes: &[u8]) -> Result<CompositeColumnName> {
        CompositeColumnName::decode(bytes)
    }

    /// Compare two encoded names without decoding them
    ///
    /// Malformed input is ordered after well-formed input at the first
    /// unreadable component; two malformed tails fall back to raw bytes.
    pub fn compare(a: &[u8], b: &[u8]) -> Ordering {
        let mut left = RawComponents::new(a);
        let mut right = RawComponents::new(b);
        loop {
            match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(Ok((va, ma))), Some(Ok((vb, mb)))) => {
                    let ord = compare_components(
                        std::iter::once((va, ma as i8)),
                        std::iter::once((vb, mb as i8)),
                    );
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                (Some(Ok(_)), Some(Err(_))) => return Ordering::Less,
                (Some(Err(_)), Some(Ok(_))) => return Ordering::Greater,
                (Some(Err(_)), Some(Err(_))) => return a.cmp(b),
            }
        }
    }
}

fn single_value(meta: &PropertyMeta, values: Vec<Value>) -> Result<Value> {
    let mut iter = values.into_iter();
    match (iter.next(), iter.next()) {
        (Some(value), None) if !value.is_null() => Ok(value),
        (Some(_), None) | (None, _) => Err(Error::invalid_key(meta.name(), "key value is null")),
        (Some(_), Some(_)) => Err(Error::invalid_key(
            meta.name(),
            "single-component key given several components",
        )),
    }
}

/// Index of the last non-null component, rejecting holes before it
fn last_present_index(meta: &PropertyMeta, values: &[Value]) -> Result<Option<usize>> {
    let last = values.iter().rposition(|v| !v.is_null());
    if let Some(last) = last {
        if let Some(hole) = values[..last].iter().position(Value::is_null) {
            return Err(Error::invalid_key(
                meta.name(),
                format!(
                    "component {} is null but component {} is set",
                    hole, last
                ),
            ));
        }
    }
    Ok(last)
}
