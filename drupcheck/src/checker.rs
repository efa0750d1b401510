//! The online proof checker
//!
//! The checker verifies a DRUP proof while it is being produced: the solver
//! feeds it every original clause, every learned clause and every deletion
//! through the streaming API ([`add_literal`](struct.Checker.html#method.add_literal)
//! followed by one of the clause verbs). Learned clauses are checked to be
//! asymmetric tautologies (implied by unit propagation), deletions are
//! checked to name a clause that is actually present. Any failed check is a
//! fatal error.
//!
//! Clauses of size two or more are stored in an arena and indexed by two
//! singly-linked watch lists, one per watched literal, in the style of the
//! original Chaff scheme: each stored clause carries one link per watched
//! position. There is no global list of clauses; every live clause is
//! reachable only through the watch lists.

use crate::{
    config,
    literal::Literal,
    memory::{format_memory_usage, Array, HeapSpace, Offset, Vector},
    output::{fatal_diagnostic, is_a_tty, percent},
};
use ansi_term::{Colour, Style};
use drupcheck_macros::HeapSpace;
use std::io::Write;

/// Index of a clause slot in the arena.
///
/// Watch-list links are clause references; the list is terminated by
/// [`NONE`](#associatedconstant.NONE). Together with the watched position
/// this replaces the pointer-to-clause links of a pointer-based
/// implementation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
struct ClauseRef(u32);

impl ClauseRef {
    /// The end-of-list marker; also the default value of a watch-list head.
    const NONE: ClauseRef = ClauseRef(u32::max_value());

    fn is_none(self) -> bool {
        self == ClauseRef::NONE
    }
}

impl Default for ClauseRef {
    fn default() -> ClauseRef {
        ClauseRef::NONE
    }
}

impl Offset for ClauseRef {
    fn as_offset(&self) -> usize {
        self.0 as usize
    }
}

/// A stored clause.
///
/// The literals at positions 0 and 1 are the watched positions; `next[0]`
/// and `next[1]` thread this clause onto the watch lists of those two
/// literals. Falsified literals are kept (only the watched positions must
/// not be false), so a clause can be found again by a later deletion even
/// after some of its literals were assigned.
#[derive(Debug, Clone, Default, HeapSpace)]
struct Clause {
    next: [ClauseRef; 2],
    literals: Vector<Literal>,
}

/// Position of a watch-list link: either a list head in the per-literal
/// table or one of the two `next` fields of a clause, selected by watched
/// position. This is the moral equivalent of the pointer-to-link cursor
/// used to unlink from a singly-linked list without a special case for the
/// head.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum WatchLink {
    Head(Literal),
    Next(ClauseRef, usize),
}

/// The checker state.
///
/// The three per-literal tables (`values`, `marks`, `watches`) always have
/// the same size, a power of two large enough to index any literal seen so
/// far. Everything else grows on demand.
#[derive(Debug, HeapSpace)]
pub struct Checker {
    /// Current truth values, `-1`, `0` or `1`, with `values[-l] == -values[l]`.
    values: Array<Literal, i8>,
    /// Mark bits for clause normalization and deletion lookup.
    marks: Array<Literal, bool>,
    /// Heads of the singly-linked watch lists.
    watches: Array<Literal, ClauseRef>,
    /// Clause storage; slots are recycled through `free_slots`.
    arena: Vector<Clause>,
    free_slots: Vector<ClauseRef>,
    /// Partial assignment trail.
    trail: Vector<Literal>,
    /// Temporary clause currently being added or deleted.
    clause: Vector<Literal>,

    /// Empty clause added or learned; latched for the rest of the session.
    inconsistent: bool,

    // Limits to control garbage collection frequency (and avoid thrashing).
    new_units: usize,
    wait_to_collect_satisfied_clauses: usize,

    // Statistics
    original: usize,
    learned: usize,
    deleted: usize,
    collected: usize,
    collections: usize,
    clauses: usize,
    remained: usize,

    leak_checking: bool,
    verbose: bool,
    logging: bool,
}

impl Checker {
    /// Create a checker in the initial empty state.
    pub fn new() -> Checker {
        Checker {
            values: Array::new(0, 0),
            marks: Array::new(false, 0),
            watches: Array::new(ClauseRef::NONE, 0),
            arena: Vector::new(),
            free_slots: Vector::new(),
            trail: Vector::new(),
            clause: Vector::new(),
            inconsistent: false,
            new_units: 0,
            wait_to_collect_satisfied_clauses: config::GARBAGE_COLLECTION_INTERVAL,
            original: 0,
            learned: 0,
            deleted: 0,
            collected: 0,
            collections: 0,
            clauses: 0,
            remained: 0,
            leak_checking: false,
            verbose: false,
            logging: false,
        }
    }

    /// Enable verbose messages: a short message after each garbage
    /// collection and a statistics block on release.
    pub fn verbose(&mut self) {
        self.verbose = true;
        comment!("enabling verbose mode of internal proof checker");
    }

    /// Enable logging of every clause passed to one of the verbs. This is
    /// mainly useful to debug discrepancies between checking proofs online
    /// and offline. A no-op unless compiled in.
    pub fn logging(&mut self) {
        if config::ENABLE_LOGGING {
            self.logging = true;
            puts!("c CHECKER enabling logging mode of internal proof checker\n");
        }
    }

    /// Enable checking, at release time, that all clauses ever added which
    /// are not root-level satisfied have been deleted. This is stronger
    /// than what DRUP requires and finds clauses that have been lost.
    pub fn enable_leak_checking(&mut self) {
        self.leak_checking = true;
        if self.verbose {
            comment!("enabling leak checking of internal proof checker");
        }
    }

    /// Append one literal, in the external (DIMACS) encoding, to the
    /// pending clause. Call one of the clause verbs to complete the clause.
    pub fn add_literal(&mut self, literal: i32) {
        if literal == 0 {
            fatal!("invalid API usage in 'add_literal': zero literal argument");
        }
        if literal == i32::min_value() {
            fatal!("invalid API usage in 'add_literal': 'i32::MIN' literal argument");
        }
        let imported = import_literal(self, literal);
        self.clause.push(imported);
    }

    /// Add the pending clause as an original (input) clause.
    pub fn add_original_clause(&mut self) {
        if config::ENABLE_LOGGING && self.logging {
            log_clause(self, "original");
        }
        if self.inconsistent {
            self.clause.clear();
            return;
        }
        self.original += 1;
        if !trivial_clause(self) {
            install_clause(self);
        }
        clear_clause(self);
        watch_invariants(self);
    }

    /// Check that the pending clause is implied by unit propagation and
    /// add it. A clause that is not implied is a fatal error.
    pub fn add_learned_clause(&mut self) {
        if config::ENABLE_LOGGING && self.logging {
            log_clause(self, "learned");
        }
        if self.inconsistent {
            self.clause.clear();
            return;
        }
        self.learned += 1;
        if !trivial_clause(self) {
            check_clause_implied(self);
            install_clause(self);
        }
        clear_clause(self);
        watch_invariants(self);
    }

    /// Delete the stored clause with exactly the literals of the pending
    /// clause. Deleting a clause that is not present is a fatal error;
    /// deleting a trivial clause (which was never stored) is a no-op.
    pub fn delete_clause(&mut self) {
        if config::ENABLE_LOGGING && self.logging {
            log_clause(self, "delete");
        }
        if self.inconsistent {
            self.clause.clear();
            return;
        }
        self.deleted += 1;
        if !trivial_clause(self) {
            find_and_delete_clause(self);
        }
        clear_clause(self);
        watch_invariants(self);
    }

    /// Tear the checker down: free all clauses, print statistics when
    /// verbose, and fail when leak checking is enabled and undeleted
    /// unsatisfied clauses remain.
    pub fn release(mut self) {
        release_all_clauses(&mut self);
        if self.verbose {
            print_statistics(&self);
        }
        if !self.inconsistent && self.leak_checking && self.remained > 0 {
            if self.remained == 1 {
                fatal!("exactly one clause remains");
            } else {
                fatal!("{} clauses remain", self.remained);
            }
        }
    }

    fn slot(&self, clause: ClauseRef) -> &Clause {
        &self.arena[clause.as_offset()]
    }

    fn slot_mut(&mut self, clause: ClauseRef) -> &mut Clause {
        &mut self.arena[clause.as_offset()]
    }
}

impl Default for Checker {
    fn default() -> Checker {
        Checker::new()
    }
}

/*------------------------------------------------------------------------*/

/// Map an external literal to the internal encoding, growing the
/// per-literal tables to the next power of two that can index both the
/// literal and its negation. Old table contents are preserved; new slots
/// are zero-valued.
fn import_literal(checker: &mut Checker, literal: i32) -> Literal {
    invariant!(literal != 0);
    invariant!(literal != i32::min_value());
    let imported = Literal::from_dimacs(literal);
    let required_size = (imported.as_offset() | 1) + 1;
    let old_size = checker.values.size();
    if required_size > old_size {
        invariant!(old_size <= usize::max_value() / 2);
        let mut new_size = if old_size == 0 { 1 } else { 2 * old_size };
        while required_size > new_size {
            new_size *= 2;
        }
        checker.values.grow(new_size);
        checker.marks.grow(new_size);
        checker.watches.grow(new_size);
    }
    imported
}

/*------------------------------------------------------------------------*/

/// Collapse duplicate literals in the pending clause and detect trivial
/// clauses. A clause is trivial if it contains two clashing literals or a
/// literal that is already true at the root; trivial clauses are neither
/// added nor deleted. The surviving literals are left marked until
/// [`clear_clause`](fn.clear_clause.html) runs.
fn trivial_clause(checker: &mut Checker) -> bool {
    requires!(checker.trail.is_empty()); // Otherwise backtrack first.
    let mut kept = 0;
    let mut trivial = false;
    for position in 0..checker.clause.len() {
        let literal = checker.clause[position];
        if checker.values[literal] > 0 {
            trivial = true;
            break;
        }
        if checker.marks[literal] {
            continue;
        }
        if checker.marks[-literal] {
            trivial = true;
            break;
        }
        checker.marks[literal] = true;
        checker.clause[kept] = literal;
        kept += 1;
    }
    checker.clause.truncate(kept);
    trivial
}

/// Unmark the literals marked above and drop the pending clause.
fn clear_clause(checker: &mut Checker) {
    for position in 0..checker.clause.len() {
        let literal = checker.clause[position];
        invariant!(checker.marks[literal]);
        checker.marks[literal] = false;
    }
    checker.clause.clear();
}

/*------------------------------------------------------------------------*/

// We do not need decision levels. Everything on the trail is either
// unassigned again after the implication check, or, if the propagation
// started from an added unit, permanently forced to that value. In the
// latter case the trail is simply cleared after unit propagation completes.

/// Set a literal to true and append it to the trail.
fn assign(checker: &mut Checker, literal: Literal) {
    requires!(checker.values[literal] == 0);
    requires!(checker.values[-literal] == 0);
    checker.values[-literal] = -1;
    checker.values[literal] = 1;
    checker.trail.push(literal);
}

/// Read the clause reference a watch-list link points to.
fn read_link(checker: &Checker, link: WatchLink) -> ClauseRef {
    match link {
        WatchLink::Head(literal) => checker.watches[literal],
        WatchLink::Next(clause, position) => checker.slot(clause).next[position],
    }
}

/// Redirect a watch-list link, unlinking or relinking a clause.
fn write_link(checker: &mut Checker, link: WatchLink, target: ClauseRef) {
    match link {
        WatchLink::Head(literal) => checker.watches[literal] = target,
        WatchLink::Next(clause, position) => checker.slot_mut(clause).next[position] = target,
    }
}

/// Standard boolean constraint propagation until completion. Returns
/// `false` iff a conflict was found. The watching scheme keeps two links
/// in each clause for the two watched literals at the first two positions;
/// replacement of watches is standard. We do not use blocking literals.
fn propagate(checker: &mut Checker) -> bool {
    let mut propagated = 0;
    while propagated < checker.trail.len() {
        let literal = checker.trail[propagated];
        propagated += 1;
        let falsified = -literal;
        let mut link = WatchLink::Head(falsified);
        loop {
            let clause = read_link(checker, link);
            if clause.is_none() {
                break;
            }
            let slot = checker.slot(clause);
            let size = slot.literals.len();
            invariant!(size > 1);
            let position = (slot.literals[1] == falsified) as usize;
            invariant!(slot.literals[position] == falsified);
            let other = slot.literals[1 - position];
            let other_value = checker.values[other];
            if other_value > 0 {
                link = WatchLink::Next(clause, position);
                continue;
            }
            let mut replacement = None;
            for offset in 2..size {
                let candidate = checker.slot(clause).literals[offset];
                if checker.values[candidate] >= 0 {
                    replacement = Some(offset);
                    break;
                }
            }
            match replacement {
                Some(offset) => {
                    // Swap the replacement into the watched position and
                    // move the clause to the replacement's watch list.
                    let successor = checker.slot(clause).next[position];
                    let slot = checker.slot_mut(clause);
                    let replacement_literal = slot.literals[offset];
                    slot.literals[offset] = falsified;
                    slot.literals[position] = replacement_literal;
                    let head = checker.watches[replacement_literal];
                    checker.slot_mut(clause).next[position] = head;
                    checker.watches[replacement_literal] = clause;
                    write_link(checker, link, successor);
                }
                None if other_value < 0 => return false,
                None => {
                    invariant!(other_value == 0);
                    assign(checker, other);
                    link = WatchLink::Next(clause, position);
                }
            }
        }
    }
    true
}

/// Pop all literals from the trail and unassign them.
fn backtrack(checker: &mut Checker) {
    while let Some(literal) = checker.trail.pop() {
        invariant!(checker.values[literal] > 0);
        invariant!(checker.values[-literal] < 0);
        checker.values[literal] = 0;
        checker.values[-literal] = 0;
    }
}

/*------------------------------------------------------------------------*/

/// Allocate an arena slot holding the literals of the pending clause.
/// The watch links are initialized by the caller.
fn new_clause(checker: &mut Checker) -> ClauseRef {
    requires!(checker.clause.len() >= 2);
    let clause = match checker.free_slots.pop() {
        Some(slot) => slot,
        None => {
            invariant!(checker.arena.len() < ClauseRef::NONE.as_offset());
            let slot = ClauseRef(checker.arena.len() as u32);
            checker.arena.push(Clause::default());
            slot
        }
    };
    let slot = &mut checker.arena[clause.as_offset()];
    invariant!(slot.literals.is_empty());
    for position in 0..checker.clause.len() {
        slot.literals.push(checker.clause[position]);
    }
    checker.clauses += 1;
    clause
}

/// Return a clause slot to the free list.
fn free_clause(checker: &mut Checker, clause: ClauseRef) {
    invariant!(checker.clauses > 0);
    checker.clauses -= 1;
    let slot = &mut checker.arena[clause.as_offset()];
    slot.literals.clear();
    slot.next = [ClauseRef::NONE, ClauseRef::NONE];
    checker.free_slots.push(clause);
}

/// Install the normalized pending clause. Unit and empty clauses are not
/// stored: the empty clause makes the checker inconsistent, and a unit is
/// assigned and propagated instead. Falsified literals are kept in stored
/// clauses, otherwise a later deletion of the identical clause could not
/// find them; the first two non-false literals are swapped into the
/// watched positions.
fn install_clause(checker: &mut Checker) {
    let mut kept = 0;
    let mut non_false = 0;
    for position in 0..checker.clause.len() {
        let literal = checker.clause[position];
        let value = checker.values[literal];
        invariant!(value <= 0);
        if value < 0 {
            continue;
        }
        checker.clause.swap(position, kept);
        kept += 1;
        non_false += 1;
        if non_false > 1 {
            break;
        }
    }

    if non_false == 0 {
        checker.inconsistent = true;
    } else if non_false == 1 {
        let unit = checker.clause[0];
        assign(checker, unit);
        checker.new_units += 1; // For garbage collection!
        if !propagate(checker) {
            checker.inconsistent = true;
        }
        // The trail is drained either way: on success all implied literals
        // stay root-level true, and after a root conflict the values no
        // longer matter.
        checker.trail.clear();
    } else {
        let literal = checker.clause[0];
        let other = checker.clause[1];
        invariant!(checker.values[literal] == 0);
        invariant!(checker.values[other] == 0);
        let clause = new_clause(checker);
        let head = checker.watches[literal];
        let other_head = checker.watches[other];
        {
            let slot = &mut checker.arena[clause.as_offset()];
            slot.next[0] = head;
            slot.next[1] = other_head;
        }
        checker.watches[literal] = clause;
        checker.watches[other] = clause;
    }

    if checker.wait_to_collect_satisfied_clauses > 0 {
        checker.wait_to_collect_satisfied_clauses -= 1;
    }

    if !checker.inconsistent
        && checker.new_units > 0
        && checker.wait_to_collect_satisfied_clauses == 0
    {
        garbage_collection(checker);
    }
}

/*------------------------------------------------------------------------*/

/// Check that the pending clause is implied by unit propagation: for each
/// literal of the clause in turn, a literal that is already true proves
/// the clause satisfied, a false literal is skipped, and an unassigned
/// literal is assigned to false and propagated, where a conflict proves
/// implication. The empty clause passes trivially (it terminates the
/// proof; installing it makes the checker inconsistent). If no conflict
/// was produced the clause is not implied and we abort.
fn check_clause_implied(checker: &mut Checker) {
    requires!(checker.trail.is_empty());
    let mut implied = checker.clause.is_empty();
    for position in 0..checker.clause.len() {
        let literal = checker.clause[position];
        let value = checker.values[literal];
        if value > 0 {
            implied = true;
        } else if value == 0 {
            assign(checker, -literal);
            if !propagate(checker) {
                implied = true;
            }
        }
        if implied {
            break;
        }
    }
    if !implied {
        verification_failed(checker, "learned clause not implied");
    }
    backtrack(checker);
}

/*------------------------------------------------------------------------*/

/// Find the stored clause that matches the marked literals of the pending
/// clause, unlink it from both watch lists and free it. We try the watch
/// list of every pending literal, which is slightly redundant but keeps
/// the lookup purely content-addressed. Aborts if no clause matches.
fn find_and_delete_clause(checker: &mut Checker) {
    let size = checker.clause.len();
    for position in 0..size {
        let literal = checker.clause[position];
        // Search this literal's watch list for a clause whose literals are
        // exactly the marked ones.
        let mut link = WatchLink::Head(literal);
        loop {
            let clause = read_link(checker, link);
            if clause.is_none() {
                break;
            }
            let slot = checker.slot(clause);
            let watch_position = (slot.literals[1] == literal) as usize;
            invariant!(slot.literals[watch_position] == literal);

            if slot.literals.len() != size {
                link = WatchLink::Next(clause, watch_position);
                continue;
            }
            let marks = &checker.marks;
            if !slot.literals.iter().all(|&candidate| marks[candidate]) {
                link = WatchLink::Next(clause, watch_position);
                continue;
            }

            // Now `clause` has exactly the literals of the pending clause.
            // Unlink the watch we arrived through.
            let successor = checker.slot(clause).next[watch_position];
            write_link(checker, link, successor);

            // Then find and unlink the other watch by walking the watch
            // list of the other watched literal.
            let other = checker.slot(clause).literals[1 - watch_position];
            let mut other_link = WatchLink::Head(other);
            loop {
                let candidate = read_link(checker, other_link);
                invariant!(!candidate.is_none()); // The clause has to be found.
                if candidate == clause {
                    break;
                }
                let candidate_slot = checker.slot(candidate);
                let candidate_position = (candidate_slot.literals[1] == other) as usize;
                invariant!(candidate_slot.literals[candidate_position] == other);
                other_link = WatchLink::Next(candidate, candidate_position);
            }
            let other_successor = checker.slot(clause).next[1 - watch_position];
            write_link(checker, other_link, other_successor);

            free_clause(checker, clause);
            return;
        }
    }
    verification_failed(checker, "clause requested to delete not found");
}

/*------------------------------------------------------------------------*/

// There is no global list of clauses, so garbage collection and release
// reach all clauses through the watch lists, and must make sure not to
// traverse freed clauses. The strategy: first disconnect the second watch
// of every clause; then every live clause is reachable exactly once, by
// following first-watch links only.

/// Unlink every clause from the list it is watched in at position 1,
/// clearing that link. Afterwards each live clause sits on exactly one
/// list, that of its literal at position 0.
fn disconnect_all_second_watches(checker: &mut Checker) {
    for offset in 0..checker.watches.size() {
        let literal = Literal::from_raw(offset as u32);
        let mut link = WatchLink::Head(literal);
        loop {
            let clause = read_link(checker, link);
            if clause.is_none() {
                break;
            }
            let slot = checker.slot(clause);
            let position = (slot.literals[1] == literal) as usize;
            invariant!(slot.literals[position] == literal);
            if position == 1 {
                let successor = slot.next[1];
                checker.slot_mut(clause).next[1] = ClauseRef::NONE;
                write_link(checker, link, successor);
            } else {
                link = WatchLink::Next(clause, 0);
            }
        }
    }
}

/// Watch the second literal of every surviving clause again. The order in
/// which clauses are reconnected is arbitrary, so while walking a
/// literal's list we can encounter clauses that an earlier step already
/// prepended here as their second watch; those are recognized by their
/// watched position and skipped through their second link.
fn reconnect_all_second_watches(checker: &mut Checker) {
    for offset in 0..checker.watches.size() {
        let literal = Literal::from_raw(offset as u32);
        let mut clause = checker.watches[literal];
        while !clause.is_none() {
            let slot = checker.slot(clause);
            if slot.literals[0] == literal {
                let other = slot.literals[1];
                invariant!(slot.next[1].is_none());
                let successor = slot.next[0];
                let head = checker.watches[other];
                checker.slot_mut(clause).next[1] = head;
                checker.watches[other] = clause;
                clause = successor;
            } else {
                invariant!(slot.literals[1] == literal);
                clause = slot.next[1];
            }
        }
    }
}

/// Walk the first-watch list of `literal` and free every clause that
/// contains a root-true literal. Assumes second watches are disconnected.
fn flush_satisfied_clauses(checker: &mut Checker, literal: Literal) -> usize {
    let mut collected = 0;
    let mut link = WatchLink::Head(literal);
    loop {
        let clause = read_link(checker, link);
        if clause.is_none() {
            break;
        }
        let slot = checker.slot(clause);
        invariant!(slot.literals[0] == literal);
        let values = &checker.values;
        let satisfied = slot.literals.iter().any(|&candidate| values[candidate] > 0);
        if satisfied {
            let successor = checker.slot(clause).next[0];
            write_link(checker, link, successor);
            free_clause(checker, clause);
            collected += 1;
        } else {
            link = WatchLink::Next(clause, 0);
        }
    }
    collected
}

/// Applies the above function to all literals, and reports the collection
/// when verbose messages are enabled.
fn flush_all_satisfied_clauses(checker: &mut Checker) {
    requires!(checker.trail.is_empty());
    let mut collected = 0;
    for offset in 0..checker.watches.size() {
        collected += flush_satisfied_clauses(checker, Literal::from_raw(offset as u32));
    }
    checker.collected += collected;
    if checker.verbose {
        comment!(
            "collected {} satisfied clauses in garbage collection {}",
            collected,
            checker.collections
        );
    }
}

/// Delay collections in arithmetically increasing intervals, and only
/// collect again once new units have been added, to avoid thrashing the
/// checker with redundant work.
fn schedule_next_garbage_collection(checker: &mut Checker) {
    let collections = checker.collections;
    let wait = if usize::max_value() / config::GARBAGE_COLLECTION_INTERVAL < collections {
        usize::max_value()
    } else {
        collections * config::GARBAGE_COLLECTION_INTERVAL
    };
    checker.new_units = 0;
    checker.wait_to_collect_satisfied_clauses = wait;
}

/// The satisfied clause garbage collection function.
fn garbage_collection(checker: &mut Checker) {
    checker.collections += 1;
    disconnect_all_second_watches(checker);
    flush_all_satisfied_clauses(checker);
    reconnect_all_second_watches(checker);
    schedule_next_garbage_collection(checker);
}

/*------------------------------------------------------------------------*/

/// Free every clause reachable from `literal`'s first-watch list, counting
/// the ones that are not root-level satisfied into the `remained` tally.
fn release_clauses(checker: &mut Checker, literal: Literal) {
    let mut clause = checker.watches[literal];
    checker.watches[literal] = ClauseRef::NONE;
    while !clause.is_none() {
        let slot = checker.slot(clause);
        invariant!(slot.next[1].is_none());
        let successor = slot.next[0];
        let values = &checker.values;
        let satisfied = slot.literals.iter().any(|&candidate| values[candidate] > 0);
        if !satisfied {
            checker.remained += 1;
        }
        free_clause(checker, clause);
        clause = successor;
    }
}

fn release_all_clauses(checker: &mut Checker) {
    if !checker.trail.is_empty() {
        backtrack(checker);
    }
    disconnect_all_second_watches(checker);
    for offset in 0..checker.watches.size() {
        release_clauses(checker, Literal::from_raw(offset as u32));
    }
}

/*------------------------------------------------------------------------*/

/// Report a failed verification together with the offending clause in
/// external form, then abort.
fn verification_failed(checker: &Checker, message: &str) -> ! {
    fatal_diagnostic(message);
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    for &literal in &checker.clause {
        let _ = write!(handle, "{} ", literal);
    }
    let _ = writeln!(handle, "0");
    let _ = handle.flush();
    drop(handle);
    panic!("{}", message);
}

/// Print the final statistics block (verbose mode only).
fn print_statistics(checker: &Checker) {
    let total = checker.original + checker.learned;
    comment!(
        "added {} original clauses {:.0}%",
        checker.original,
        percent(checker.original, total)
    );
    comment!(
        "checked {} learned clauses {:.0}%",
        checker.learned,
        percent(checker.learned, total)
    );
    comment!(
        "found and deleted {} clauses {:.0}%",
        checker.deleted,
        percent(checker.deleted, total)
    );
    comment!(
        "collected {} satisfied clauses {:.0}%",
        checker.collected,
        percent(checker.collected, total)
    );
    comment!("triggered {} garbage collections", checker.collections);
    comment!("{} clauses remained", checker.remained);
    comment!("used {} of heap memory", format_memory_usage(checker.heap_space()));
}

/// Print the pending clause in external form, tagged with the verb.
fn log_clause(checker: &Checker, kind: &str) {
    invariant!(config::ENABLE_LOGGING && checker.logging);
    let style = if is_a_tty() {
        Colour::Purple.normal()
    } else {
        Style::default()
    };
    let mut line = format!("c CHECKER {}", kind);
    for &literal in &checker.clause {
        line += &format!(" {}", literal);
    }
    puts!("{}\n", style.paint(&line));
}

/// Expensive sanity check of the two-watch index, disabled by default.
/// Each clause in a literal's list must watch that literal, and a clause
/// none of whose watched literals is true must not watch a false literal.
fn watch_invariants(checker: &Checker) {
    if !config::CHECK_WATCH_INVARIANTS || checker.inconsistent {
        return;
    }
    for offset in 0..checker.watches.size() {
        let literal = Literal::from_raw(offset as u32);
        let mut clause = checker.watches[literal];
        while !clause.is_none() {
            let slot = checker.slot(clause);
            let position = (slot.literals[1] == literal) as usize;
            assert!(
                slot.literals[position] == literal,
                "watch {} not within the first two literals",
                literal
            );
            let first = slot.literals[0];
            let second = slot.literals[1];
            assert!(
                checker.values[first] > 0
                    || checker.values[second] > 0
                    || (checker.values[-first] <= 0 && checker.values[-second] <= 0),
                "watched clause with a false watch but no true watch"
            );
            clause = slot.next[position];
        }
    }
}

/*------------------------------------------------------------------------*/

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! clause {
        ($($literal:expr),*) => {
            &[$($literal),*][..]
        };
    }

    fn push_clause(checker: &mut Checker, literals: &[i32]) {
        for &literal in literals {
            checker.add_literal(literal);
        }
    }

    fn original(checker: &mut Checker, literals: &[i32]) {
        push_clause(checker, literals);
        checker.add_original_clause();
        check_invariants(checker);
    }

    fn learned(checker: &mut Checker, literals: &[i32]) {
        push_clause(checker, literals);
        checker.add_learned_clause();
        check_invariants(checker);
    }

    fn delete(checker: &mut Checker, literals: &[i32]) {
        push_clause(checker, literals);
        checker.delete_clause();
        check_invariants(checker);
    }

    fn value_of(checker: &Checker, literal: i32) -> i8 {
        checker.values[Literal::from_dimacs(literal)]
    }

    /// Collect every (clause, watching literal) pair reachable from the
    /// watch lists, checking watched positions along the way.
    fn watch_occurrences(checker: &Checker) -> Vec<(u32, Literal)> {
        let mut result = Vec::new();
        for offset in 0..checker.watches.size() {
            let literal = Literal::from_raw(offset as u32);
            let mut clause = checker.watches[literal];
            let mut steps = 0;
            while !clause.is_none() {
                let slot = checker.slot(clause);
                let position = (slot.literals[1] == literal) as usize;
                assert_eq!(
                    slot.literals[position],
                    literal,
                    "watched literal must sit at position 0 or 1"
                );
                result.push((clause.0, literal));
                clause = slot.next[position];
                steps += 1;
                assert!(steps < 1_000_000, "cycle in watch list of {}", literal);
            }
        }
        result
    }

    /// The universal invariants that must hold after every verb.
    fn check_invariants(checker: &Checker) {
        // The trail is drained at the end of each verb.
        assert!(checker.trail.is_empty());
        // The pending clause and its marks are cleared.
        assert!(checker.clause.is_empty());
        for offset in 0..checker.marks.size() {
            assert!(!checker.marks[Literal::from_raw(offset as u32)]);
        }
        // A literal and its negation are never both non-zero.
        let mut offset = 0;
        while offset + 1 < checker.values.size() {
            let literal = Literal::from_raw(offset as u32);
            assert_eq!(checker.values[literal] + checker.values[-literal], 0);
            offset += 2;
        }
        // Every live clause is watched exactly twice, once per watched
        // literal, and (while consistent) a clause without a true watch
        // has no false watch.
        let occurrences = watch_occurrences(checker);
        assert_eq!(occurrences.len(), 2 * checker.clauses);
        let mut seen: Vec<u32> = occurrences.iter().map(|&(clause, _)| clause).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), checker.clauses);
        for &index in &seen {
            let clause = ClauseRef(index);
            let slot = checker.slot(clause);
            let first = slot.literals[0];
            let second = slot.literals[1];
            let watchers: Vec<Literal> = occurrences
                .iter()
                .filter(|&&(other, _)| other == index)
                .map(|&(_, literal)| literal)
                .collect();
            assert_eq!(watchers.len(), 2);
            assert!(watchers.contains(&first));
            assert!(watchers.contains(&second));
            assert!(
                checker.inconsistent
                    || checker.values[first] > 0
                    || checker.values[second] > 0
                    || (checker.values[-first] <= 0 && checker.values[-second] <= 0)
            );
        }
    }

    #[test]
    fn unit_propagation_implies_learned_clause() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2));
        original(&mut checker, clause!(-1));
        assert!(value_of(&checker, -1) > 0);
        assert!(value_of(&checker, 2) > 0);
        learned(&mut checker, clause!(2));
        assert!(!checker.inconsistent);
        assert_eq!(checker.learned, 1);
    }

    #[test]
    #[should_panic(expected = "learned clause not implied")]
    fn unimplied_learned_clause_is_fatal() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2));
        learned(&mut checker, clause!(3));
    }

    #[test]
    fn learned_clause_implied_by_propagation_conflict() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2));
        original(&mut checker, clause!(-1, 2));
        // Assigning -2 falsifies one of the two clauses by propagation.
        learned(&mut checker, clause!(2));
        assert!(!checker.inconsistent);
        // The learned unit was installed and propagated.
        assert!(value_of(&checker, 2) > 0);
        assert_eq!(checker.clauses, 2);
    }

    #[test]
    fn conflicting_unit_latches_inconsistency() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2));
        original(&mut checker, clause!(-1, 2));
        original(&mut checker, clause!(-2));
        // -2 propagates both -1 and 1, a conflict at the root.
        assert!(checker.inconsistent);
        // Subsequent verbs are accepted but do not mutate the store.
        let clauses_before = checker.clauses;
        original(&mut checker, clause!(5, 6));
        learned(&mut checker, clause!(7));
        delete(&mut checker, clause!(1, 2));
        assert!(checker.inconsistent);
        assert_eq!(checker.clauses, clauses_before);
    }

    #[test]
    fn satisfied_clauses_are_collected() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2));
        original(&mut checker, clause!(-1, 2));
        original(&mut checker, clause!(-1));
        // -1 satisfies the second clause and propagates 2, satisfying the
        // first; both go in the next collection.
        assert!(value_of(&checker, -1) > 0);
        assert!(value_of(&checker, 2) > 0);
        assert_eq!(checker.clauses, 2);
        assert!(checker.new_units > 0);
        checker.wait_to_collect_satisfied_clauses = 1;
        original(&mut checker, clause!(3, 4));
        assert_eq!(checker.collections, 1);
        assert_eq!(checker.collected, 2);
        assert_eq!(checker.clauses, 1);
        assert_eq!(checker.new_units, 0);
        assert_eq!(
            checker.wait_to_collect_satisfied_clauses,
            config::GARBAGE_COLLECTION_INTERVAL
        );
    }

    #[test]
    fn collection_waits_for_new_units() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2));
        checker.wait_to_collect_satisfied_clauses = 1;
        // No new units yet, so the elapsed cooldown does not collect.
        original(&mut checker, clause!(3, 4));
        assert_eq!(checker.collections, 0);
        assert_eq!(checker.wait_to_collect_satisfied_clauses, 0);
    }

    #[test]
    fn add_then_delete_restores_the_store() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(4, 5, 6));
        let before = watch_occurrences(&checker);
        original(&mut checker, clause!(1, 2, 3));
        assert_eq!(checker.clauses, 2);
        // Deletion goes by clause content, not literal order.
        delete(&mut checker, clause!(3, 1, 2));
        assert_eq!(checker.clauses, 1);
        assert_eq!(watch_occurrences(&checker), before);
    }

    #[test]
    #[should_panic(expected = "clause requested to delete not found")]
    fn deleting_an_absent_clause_is_fatal() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2));
        delete(&mut checker, clause!(1, 3));
    }

    #[test]
    fn deleting_a_satisfied_clause_is_a_no_op() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2));
        original(&mut checker, clause!(1));
        // The clause is root-satisfied now, so the deletion is dropped
        // during normalization instead of being looked up.
        delete(&mut checker, clause!(1, 2));
        assert_eq!(checker.deleted, 1);
        assert_eq!(checker.clauses, 1);
    }

    #[test]
    fn tautological_clause_is_a_no_op() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, -1, 2));
        assert_eq!(checker.clauses, 0);
        assert!(!checker.inconsistent);
        assert_eq!(checker.original, 1);
    }

    #[test]
    fn duplicate_literals_collapse() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 1, 2));
        assert_eq!(checker.clauses, 1);
        let occurrences = watch_occurrences(&checker);
        let clause = ClauseRef(occurrences[0].0);
        assert_eq!(checker.slot(clause).literals.len(), 2);
        // The stored clause equals the deduplicated one.
        delete(&mut checker, clause!(1, 2));
        assert_eq!(checker.clauses, 0);
    }

    #[test]
    fn empty_original_clause_makes_the_checker_inconsistent() {
        let mut checker = Checker::new();
        original(&mut checker, clause!());
        assert!(checker.inconsistent);
        assert_eq!(checker.clauses, 0);
    }

    #[test]
    fn empty_learned_clause_terminates_the_proof() {
        let mut checker = Checker::new();
        learned(&mut checker, clause!());
        assert!(checker.inconsistent);
    }

    #[test]
    fn tautological_learned_clause_is_a_no_op() {
        let mut checker = Checker::new();
        learned(&mut checker, clause!(1, -1));
        assert!(!checker.inconsistent);
        assert_eq!(checker.clauses, 0);
    }

    #[test]
    fn importing_a_large_literal_grows_the_tables() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2));
        original(&mut checker, clause!(-1));
        let old_size = checker.values.size();
        assert!(value_of(&checker, 2) > 0);
        original(&mut checker, clause!(1000, 3));
        let new_size = checker.values.size();
        assert!(new_size > old_size);
        assert!(new_size.is_power_of_two());
        assert!(new_size > Literal::from_dimacs(-1000).as_offset());
        // The doubling preserved the previous assignment.
        assert!(value_of(&checker, 2) > 0);
        assert!(value_of(&checker, -1) > 0);
        assert_eq!(checker.clauses, 2);
    }

    #[test]
    fn falsified_literals_are_kept_in_stored_clauses() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1));
        // -1 is false at the root but stays in the stored clause.
        original(&mut checker, clause!(-1, 2, 3));
        let occurrences = watch_occurrences(&checker);
        let clause = ClauseRef(occurrences[0].0);
        assert_eq!(checker.slot(clause).literals.len(), 3);
        // Deleting requires naming the falsified literal as well.
        delete(&mut checker, clause!(-1, 2, 3));
        assert_eq!(checker.clauses, 0);
    }

    #[test]
    fn garbage_collection_rebuilds_the_watch_lists() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2, 3));
        original(&mut checker, clause!(-2, 4));
        original(&mut checker, clause!(-3, -4, 1));
        let mut before = watch_occurrences(&checker);
        // Nothing is satisfied, so a collection must keep every clause and
        // every watch.
        garbage_collection(&mut checker);
        check_invariants(&checker);
        let mut after = watch_occurrences(&checker);
        before.sort_unstable();
        after.sort_unstable();
        assert_eq!(before, after);
        assert_eq!(checker.clauses, 3);
        assert_eq!(checker.collected, 0);
    }

    #[test]
    fn release_counts_unsatisfied_clauses() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2));
        original(&mut checker, clause!(3, 4));
        original(&mut checker, clause!(1));
        release_all_clauses(&mut checker);
        // {1, 2} is satisfied by the unit, {3, 4} remained.
        assert_eq!(checker.remained, 1);
        assert_eq!(checker.clauses, 0);
    }

    #[test]
    fn release_after_delete_leaves_nothing() {
        let mut checker = Checker::new();
        checker.enable_leak_checking();
        push_clause(&mut checker, clause!(1, 2, 3));
        checker.add_original_clause();
        push_clause(&mut checker, clause!(1, 2, 3));
        checker.delete_clause();
        checker.release();
    }

    #[test]
    #[should_panic(expected = "exactly one clause remains")]
    fn leak_checking_detects_a_remaining_clause() {
        let mut checker = Checker::new();
        checker.enable_leak_checking();
        push_clause(&mut checker, clause!(1, 2, 3));
        checker.add_original_clause();
        checker.release();
    }

    #[test]
    fn leak_checking_ignores_satisfied_clauses() {
        let mut checker = Checker::new();
        checker.enable_leak_checking();
        push_clause(&mut checker, clause!(1, 2));
        checker.add_original_clause();
        push_clause(&mut checker, clause!(1));
        checker.add_original_clause();
        // {1, 2} is root-satisfied, so it does not count as leaked.
        checker.release();
    }

    #[test]
    fn watch_replacement_prefers_unassigned_literals() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2, 3));
        original(&mut checker, clause!(-1));
        // The watch on 1 moved to 3 or stayed repaired; propagation must
        // not have forced anything beyond -1.
        assert!(value_of(&checker, -1) > 0);
        assert_eq!(value_of(&checker, 2), 0);
        assert_eq!(value_of(&checker, 3), 0);
        assert_eq!(checker.clauses, 1);
    }

    #[test]
    fn learned_unit_is_permanent() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2));
        original(&mut checker, clause!(1, -2));
        learned(&mut checker, clause!(1));
        assert!(value_of(&checker, 1) > 0);
        // Both stored clauses are now root-satisfied.
        learned(&mut checker, clause!(1, 3));
        assert_eq!(checker.clauses, 2);
    }

    #[test]
    fn arena_slots_are_recycled() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2));
        delete(&mut checker, clause!(1, 2));
        assert_eq!(checker.free_slots.len(), 1);
        original(&mut checker, clause!(3, 4));
        assert_eq!(checker.free_slots.len(), 0);
        assert_eq!(checker.arena.len(), 1);
    }

    #[test]
    #[should_panic(expected = "zero literal argument")]
    fn zero_literal_is_invalid_usage() {
        let mut checker = Checker::new();
        checker.add_literal(0);
    }

    #[test]
    #[should_panic(expected = "'i32::MIN' literal argument")]
    fn minimum_literal_is_invalid_usage() {
        let mut checker = Checker::new();
        checker.add_literal(i32::min_value());
    }

    #[test]
    fn cooldown_decrements_once_per_installed_clause() {
        let mut checker = Checker::new();
        let initial = checker.wait_to_collect_satisfied_clauses;
        original(&mut checker, clause!(1, 2));
        assert_eq!(checker.wait_to_collect_satisfied_clauses, initial - 1);
        // Trivial clauses do not count.
        original(&mut checker, clause!(3, -3));
        assert_eq!(checker.wait_to_collect_satisfied_clauses, initial - 1);
        // Deletions do not count either.
        delete(&mut checker, clause!(1, 2));
        assert_eq!(checker.wait_to_collect_satisfied_clauses, initial - 1);
    }

    #[test]
    fn verbose_and_logging_do_not_alter_semantics() {
        let mut loud = Checker::new();
        loud.verbose();
        loud.logging();
        let mut quiet = Checker::new();
        for checker in &mut [&mut loud, &mut quiet] {
            original(checker, clause!(1, 2));
            original(checker, clause!(-1));
            learned(checker, clause!(2));
            delete(checker, clause!(1, 2));
        }
        assert_eq!(loud.clauses, quiet.clauses);
        assert_eq!(loud.inconsistent, quiet.inconsistent);
        assert_eq!(watch_occurrences(&loud), watch_occurrences(&quiet));
        loud.release();
    }

    #[test]
    fn statistics_count_verbs() {
        let mut checker = Checker::new();
        original(&mut checker, clause!(1, 2));
        original(&mut checker, clause!(2, 3));
        learned(&mut checker, clause!(1, 2, 3));
        delete(&mut checker, clause!(1, 2));
        assert_eq!(checker.original, 2);
        assert_eq!(checker.learned, 1);
        assert_eq!(checker.deleted, 1);
        assert_eq!(checker.clauses, 2);
    }
}
