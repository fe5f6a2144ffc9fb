// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Interest packet: a request identified primarily by its name.

use bytes::Bytes;

use crate::packet::{
    name::{Name, NameComponent},
    signature::KeyLocator,
};

/// Filters inside an Interest narrowing which Data may answer it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exclude {
    entries: Vec<ExcludeEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExcludeEntry {
    Any,
    Component(NameComponent),
}

impl Exclude {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ExcludeEntry] {
        &self.entries
    }

    pub fn append_any(&mut self) -> &mut Self {
        self.entries.push(ExcludeEntry::Any);
        self
    }

    pub fn append_component(&mut self, component: NameComponent) -> &mut Self {
        self.entries.push(ExcludeEntry::Component(component));
        self
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether `component` falls inside one of the excluded ranges.
    ///
    /// An `Any` entry excludes the open-ended range between its
    /// neighboring components; a bare component excludes itself.
    pub fn matches(&self, component: &NameComponent) -> bool {
        for (i, entry) in self.entries.iter().enumerate() {
            match entry {
                ExcludeEntry::Any => {
                    let lower = i.checked_sub(1).and_then(|j| match &self.entries[j] {
                        ExcludeEntry::Component(c) => Some(c),
                        ExcludeEntry::Any => None,
                    });
                    let upper = match self.entries.get(i + 1) {
                        Some(ExcludeEntry::Component(c)) => Some(c),
                        _ => None,
                    };
                    if lower.is_none_or(|l| component >= l)
                        && upper.is_none_or(|u| component <= u)
                    {
                        return true;
                    }
                },
                ExcludeEntry::Component(c) => {
                    if component == c {
                        return true;
                    }
                },
            }
        }
        false
    }
}

/// A request for a named Data packet.
///
/// The on-wire encoding is deterministic given the object state, except
/// for the nonce, which is generated when absent and always emitted as
/// exactly 4 bytes.
#[derive(Debug, Clone, Default)]
pub struct Interest {
    name: Name,
    min_suffix_components: Option<u64>,
    max_suffix_components: Option<u64>,
    key_locator: Option<KeyLocator>,
    exclude: Exclude,
    child_selector: Option<u64>,
    must_be_fresh: bool,
    nonce: Bytes,
    lifetime_ms: Option<u64>,
    link_wire_encoding: Option<Bytes>,
    selected_delegation_index: Option<u64>,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn name_mut(&mut self) -> &mut Name {
        &mut self.name
    }

    pub fn set_name(&mut self, name: Name) -> &mut Self {
        self.name = name;
        self
    }

    #[inline]
    pub fn min_suffix_components(&self) -> Option<u64> {
        self.min_suffix_components
    }

    pub fn set_min_suffix_components(&mut self, value: Option<u64>) -> &mut Self {
        self.min_suffix_components = value;
        self
    }

    #[inline]
    pub fn max_suffix_components(&self) -> Option<u64> {
        self.max_suffix_components
    }

    pub fn set_max_suffix_components(&mut self, value: Option<u64>) -> &mut Self {
        self.max_suffix_components = value;
        self
    }

    #[inline]
    pub fn key_locator(&self) -> Option<&KeyLocator> {
        self.key_locator.as_ref()
    }

    pub fn set_key_locator(&mut self, value: Option<KeyLocator>) -> &mut Self {
        self.key_locator = value;
        self
    }

    #[inline]
    pub fn exclude(&self) -> &Exclude {
        &self.exclude
    }

    pub fn exclude_mut(&mut self) -> &mut Exclude {
        &mut self.exclude
    }

    #[inline]
    pub fn child_selector(&self) -> Option<u64> {
        self.child_selector
    }

    pub fn set_child_selector(&mut self, value: Option<u64>) -> &mut Self {
        self.child_selector = value;
        self
    }

    #[inline]
    pub fn must_be_fresh(&self) -> bool {
        self.must_be_fresh
    }

    pub fn set_must_be_fresh(&mut self, value: bool) -> &mut Self {
        self.must_be_fresh = value;
        self
    }

    #[inline]
    pub fn nonce(&self) -> &Bytes {
        &self.nonce
    }

    pub fn set_nonce(&mut self, nonce: Bytes) -> &mut Self {
        self.nonce = nonce;
        self
    }

    #[inline]
    pub fn lifetime_ms(&self) -> Option<u64> {
        self.lifetime_ms
    }

    pub fn set_lifetime_ms(&mut self, value: Option<u64>) -> &mut Self {
        self.lifetime_ms = value;
        self
    }

    #[inline]
    pub fn link_wire_encoding(&self) -> Option<&Bytes> {
        self.link_wire_encoding.as_ref()
    }

    pub fn set_link_wire_encoding(&mut self, value: Option<Bytes>) -> &mut Self {
        self.link_wire_encoding = value;
        self
    }

    #[inline]
    pub fn selected_delegation_index(&self) -> Option<u64> {
        self.selected_delegation_index
    }

    pub fn set_selected_delegation_index(&mut self, value: Option<u64>) -> &mut Self {
        self.selected_delegation_index = value;
        self
    }

    /// Whether a Data packet of the given name could answer this
    /// interest, taking the selectors into account.
    ///
    /// Suffix counts include the implicit digest component every Data
    /// name conceptually ends with.
    pub fn matches_name(&self, name: &Name) -> bool {
        if !self.name.is_prefix_of(name) {
            return false;
        }
        let suffix_count = (name.size() + 1 - self.name.size()) as u64;
        if self
            .min_suffix_components
            .is_some_and(|min| suffix_count < min)
        {
            return false;
        }
        if self
            .max_suffix_components
            .is_some_and(|max| suffix_count > max)
        {
            return false;
        }
        if !self.exclude.is_empty()
            && let Some(component) = name.get(self.name.size() as isize)
            && self.exclude.matches(component)
        {
            return false;
        }
        true
    }

    /// Whether any selector is set, i.e. whether a Selectors TLV goes on
    /// the wire.
    pub fn has_selectors(&self) -> bool {
        self.min_suffix_components.is_some()
            || self.max_suffix_components.is_some()
            || self.key_locator.is_some()
            || !self.exclude.is_empty()
            || self.child_selector.is_some()
            || self.must_be_fresh
    }
}
