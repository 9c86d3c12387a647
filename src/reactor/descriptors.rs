// -----------------------------------------------------------------------------------------------
// dchub - Direct Connect hub server
//
// Copyright (c) 2022, Frank Sommer.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are met:
//
// * Redistributions of source code must retain the above copyright notice, this
//   list of conditions and the following disclaimer.
//
// * Redistributions in binary form must reproduce the above copyright notice,
//   this list of conditions and the following disclaimer in the documentation
//   and/or other materials provided with the distribution.
//
// * Neither the name of the copyright holder nor the names of its
//   contributors may be used to endorse or promote products derived from
//   this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS"
// AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
// IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE
// FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
// DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER
// CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY,
// OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.
// -----------------------------------------------------------------------------------------------

//! Dense descriptor-indexed table mapping an OS descriptor to its owning connection.

use crate::error::*;
use crate::hubxe;

/// Maps a small non-negative integer descriptor to the connection owning it.
/// Backed by a dense array that grows geometrically; descriptors in one process
/// are small and mostly contiguous, so indexing beats hashing here.
#[derive(Debug, Default)]
pub struct DescriptorTable<T> {
    slots: Vec<Option<T>>,
    max_descriptor: usize,
    len: usize
}

impl<T> DescriptorTable<T> {
    pub fn new() -> DescriptorTable<T> {
        DescriptorTable { slots: Vec::new(), max_descriptor: 0, len: 0 }
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize { self.len }

    #[inline]
    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Highest descriptor ever added.
    #[inline]
    pub fn max_descriptor(&self) -> usize { self.max_descriptor }

    /// Inserts `value` under `descriptor`.
    ///
    /// # Errors
    /// Fails loudly if the slot is already occupied; re-adding a live descriptor is a
    /// programmer error, never a silent overwrite.
    pub fn add(&mut self, descriptor: usize, value: T) -> Result<(), HubError> {
        self.grow_to_fit(descriptor);
        if self.slots[descriptor].is_some() {
            return Err(hubxe!(E_DESCR_ALREADY_PRESENT, descriptor.to_string()))
        }
        self.slots[descriptor] = Some(value);
        self.len += 1;
        if descriptor > self.max_descriptor { self.max_descriptor = descriptor; }
        Ok(())
    }

    /// Removes the entry for `descriptor`, if present. Idempotent: removing an absent
    /// descriptor is not an error.
    pub fn remove(&mut self, descriptor: usize) -> Option<T> {
        let removed = self.slots.get_mut(descriptor).and_then(|s| s.take());
        if removed.is_some() { self.len -= 1; }
        removed
    }

    #[inline]
    pub fn has(&self, descriptor: usize) -> bool {
        self.slots.get(descriptor).map_or(false, |s| s.is_some())
    }

    #[inline]
    pub fn lookup(&self, descriptor: usize) -> Option<&T> {
        self.slots.get(descriptor).and_then(|s| s.as_ref())
    }

    #[inline]
    pub fn lookup_mut(&mut self, descriptor: usize) -> Option<&mut T> {
        self.slots.get_mut(descriptor).and_then(|s| s.as_mut())
    }

    /// Iterates live entries in ascending descriptor order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots.iter().enumerate().filter_map(|(d, s)| s.as_ref().map(|v| (d, v)))
    }

    fn grow_to_fit(&mut self, descriptor: usize) {
        if descriptor < self.slots.len() { return }
        let new_len = descriptor + descriptor / 4 + 1;
        self.slots.resize_with(new_len, || None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_lookup() {
        let mut t = DescriptorTable::new();
        t.add(3, "conn3").unwrap();
        assert_eq!(t.lookup(3), Some(&"conn3"));
        assert!(t.has(3));
        assert_eq!(t.len(), 1);
        assert_eq!(t.max_descriptor(), 3);
    }

    #[test]
    fn re_add_present_descriptor_fails() {
        let mut t = DescriptorTable::new();
        t.add(1, "a").unwrap();
        let err = t.add(1, "b").unwrap_err();
        assert_eq!(err.severity(), Severity::Error);
        assert_eq!(t.lookup(1), Some(&"a"));
    }

    #[test]
    fn remove_absent_is_idempotent() {
        let mut t: DescriptorTable<&str> = DescriptorTable::new();
        assert!(t.remove(5).is_none());
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn add_then_remove_restores_prior_state() {
        let mut t = DescriptorTable::new();
        t.add(2, "x").unwrap();
        assert_eq!(t.remove(2), Some("x"));
        assert!(! t.has(2));
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn growing_preserves_prior_mappings() {
        let mut t = DescriptorTable::new();
        t.add(0, "zero").unwrap();
        t.add(1, "one").unwrap();
        t.add(100, "hundred").unwrap();
        assert_eq!(t.lookup(0), Some(&"zero"));
        assert_eq!(t.lookup(1), Some(&"one"));
        assert_eq!(t.lookup(100), Some(&"hundred"));
    }

    #[test]
    fn dense_accept_storm() {
        let mut t = DescriptorTable::new();
        for d in 0 .. 1024 {
            t.add(d, d).unwrap();
        }
        assert_eq!(t.len(), 1024);
        for d in 0 .. 1024 {
            t.remove(d);
        }
        assert!(t.is_empty());
    }

    #[test]
    fn closing_and_reopening_same_descriptor_binds_new_value() {
        let mut t = DescriptorTable::new();
        t.add(7, "old").unwrap();
        t.remove(7);
        t.add(7, "new").unwrap();
        assert_eq!(t.lookup(7), Some(&"new"));
    }

    #[test]
    fn iter_is_ascending_by_descriptor() {
        let mut t = DescriptorTable::new();
        t.add(5, "five").unwrap();
        t.add(1, "one").unwrap();
        t.add(3, "three").unwrap();
        let order: Vec<usize> = t.iter().map(|(d, _)| d).collect();
        assert_eq!(order, vec![1, 3, 5]);
    }
}
