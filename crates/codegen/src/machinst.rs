//! Target-independent machine instruction handling: the [`MachInst`] trait
//! and the index-linked instruction list trampolines are built in.

use crate::buffer::{CodeBuffer, CodeOffset};
use core::fmt;
use cranelift_entity::{PrimaryMap, entity_impl};

/// A machine instruction with a fixed-size encoding.
pub trait MachInst: Clone + fmt::Debug {
    /// Size in bytes of this instruction's encoding.
    fn byte_size(&self) -> CodeOffset;

    /// Encodes this instruction at the end of `sink`.
    fn emit(&self, sink: &mut CodeBuffer);

    /// Renders this instruction in assembly syntax.
    fn pretty_print(&self) -> String;
}

/// Index of an instruction inside an [`InstList`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(u32);
entity_impl!(InstId, "inst");

/// An instruction together with its neighbours in list order.
#[derive(Clone, Debug)]
pub struct InstNode<I> {
    /// The instruction.
    pub inst: I,
    /// Previous instruction in list order.
    pub prev: Option<InstId>,
    /// Next instruction in list order.
    pub next: Option<InstId>,
}

/// A doubly linked list of instructions stored in an arena.
///
/// Instructions are never removed; list order is given by the `prev`/`next`
/// links rather than by arena order, so a node can be patched in place after
/// the instructions following it are known.
#[derive(Clone, Debug)]
pub struct InstList<I> {
    nodes: PrimaryMap<InstId, InstNode<I>>,
    head: Option<InstId>,
    tail: Option<InstId>,
}

impl<I> Default for InstList<I> {
    fn default() -> Self {
        Self {
            nodes: PrimaryMap::new(),
            head: None,
            tail: None,
        }
    }
}

impl<I: MachInst> InstList<I> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `inst` after the current tail.
    pub fn push(&mut self, inst: I) -> InstId {
        log::trace!("push {}", inst.pretty_print());
        let id = self.nodes.push(InstNode {
            inst,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        id
    }

    /// Appends every instruction of `insts`, in order.
    pub fn extend(&mut self, insts: impl IntoIterator<Item = I>) {
        for inst in insts {
            self.push(inst);
        }
    }

    /// The first instruction, if any.
    pub fn head(&self) -> Option<InstId> {
        self.head
    }

    /// The last instruction, if any.
    pub fn tail(&self) -> Option<InstId> {
        self.tail
    }

    /// The node for `id`.
    pub fn node(&self, id: InstId) -> &InstNode<I> {
        &self.nodes[id]
    }

    /// Replaces the instruction at `id`, keeping its position.
    pub fn replace(&mut self, id: InstId, inst: I) {
        log::trace!("patch {id}: {}", inst.pretty_print());
        self.nodes[id].inst = inst;
    }

    /// Number of instructions in the list.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the list has no instructions.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over the instructions in list order, following `next` links
    /// from the head.
    pub fn iter(&self) -> Iter<'_, I> {
        Iter {
            list: self,
            cur: self.head,
        }
    }

    /// Iterates over the instructions in list order along with the offset
    /// each one is encoded at.
    pub fn iter_with_offsets(&self) -> impl Iterator<Item = (CodeOffset, InstId, &I)> + '_ {
        let mut offset = 0;
        self.iter().map(move |(id, inst)| {
            let at = offset;
            offset += inst.byte_size();
            (at, id, inst)
        })
    }

    /// Total encoded size of the list.
    pub fn byte_size(&self) -> CodeOffset {
        self.iter().map(|(_, inst)| inst.byte_size()).sum()
    }

    /// Encodes every instruction in list order.
    pub fn emit(&self, sink: &mut CodeBuffer) {
        for (_, inst) in self.iter() {
            inst.emit(sink);
        }
    }
}

/// Iterator over an [`InstList`] in list order.
pub struct Iter<'a, I> {
    list: &'a InstList<I>,
    cur: Option<InstId>,
}

impl<'a, I> Iterator for Iter<'a, I> {
    type Item = (InstId, &'a I);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        let node = &self.list.nodes[id];
        self.cur = node.next;
        Some((id, &node.inst))
    }
}
