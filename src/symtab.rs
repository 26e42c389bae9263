//! Symbol table: a stack of lexical scopes (C4).
//!
//! Scopes are arena-allocated (`Vec<Scope>`) and addressed by index,
//! with `enclosing_scope: Option<usize>` back-pointers rather than
//! shared-mutable references (spec §9) — this avoids ownership cycles
//! and keeps lookups a simple loop. A second stack, `active`, tracks
//! which arena entries are part of the currently-open lexical chain
//! while parsing; popping a scope off `active` does not remove it from
//! the arena, since the MIPS emitter and sibling call sites still need
//! to resolve entities declared in scopes that have already closed.

use crate::error::{CompileError, ErrorKind};
use crate::token::Pos;
use std::fmt;

/// Starting temp-offset for every scope; slots 0/4/8 are reserved for
/// the return address, access link, and return-value pointer (spec §3,
/// §4.5).
pub const BASE_OFFSET: i32 = 12;
const SLOT_SIZE: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    Cv,
    Ref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetType {
    Int,
    Void,
}

#[derive(Debug, Clone, Copy)]
pub struct Argument {
    pub mode: ParamMode,
}

#[derive(Debug, Clone)]
pub enum EntityKind {
    Variable,
    Parameter {
        mode: ParamMode,
    },
    Temporary,
    Function {
        ret_type: RetType,
        start_quad: Option<usize>,
        framelength: Option<i32>,
        args: Vec<Argument>,
    },
}

impl EntityKind {
    fn discriminant_eq(&self, other: &EntityKind) -> bool {
        matches!(
            (self, other),
            (EntityKind::Variable, EntityKind::Variable)
                | (EntityKind::Parameter { .. }, EntityKind::Parameter { .. })
                | (EntityKind::Temporary, EntityKind::Temporary)
                | (EntityKind::Function { .. }, EntityKind::Function { .. })
        )
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    /// Frame-relative byte offset; `None` for `Function` entities, which
    /// occupy no slot of their own (spec §3).
    pub offset: Option<i32>,
}

#[derive(Debug)]
pub struct Scope {
    pub nested_level: usize,
    pub enclosing_scope: Option<usize>,
    pub entities: Vec<Entity>,
    pub tmp_offset: i32,
    /// Name of the program/procedure/function this scope belongs to,
    /// used for `begin_block`/`end_block` quads and, for subprogram
    /// scopes, to find the matching `Function` entity in the enclosing
    /// scope.
    pub owner_name: String,
}

impl Scope {
    pub fn framelength(&self) -> i32 {
        self.tmp_offset
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    arena: Vec<Scope>,
    active: Vec<usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_idx(&self) -> usize {
        *self.active.last().expect("no open scope")
    }

    pub fn current(&self) -> &Scope {
        &self.arena[self.current_idx()]
    }

    pub fn scope(&self, idx: usize) -> &Scope {
        &self.arena[idx]
    }

    /// Pushes a new scope for a subprogram/program definition (spec §4.3).
    /// Must be called *after* the owning `Function` entity (if any) has
    /// already been inserted into the current (enclosing) scope.
    pub fn add_new_scope(&mut self, owner_name: &str) -> usize {
        let enclosing_scope = self.active.last().copied();
        let nested_level = self.active.len();
        let idx = self.arena.len();
        self.arena.push(Scope {
            nested_level,
            enclosing_scope,
            entities: Vec::new(),
            tmp_offset: BASE_OFFSET,
            owner_name: owner_name.to_string(),
        });
        self.active.push(idx);
        idx
    }

    /// Closes the current scope: records its final framelength onto the
    /// matching `Function` entity in the enclosing scope (if any) and
    /// removes it from the open chain. The arena entry itself survives
    /// for later lookups by the MIPS emitter (spec lifecycle, §3).
    pub fn pop_scope(&mut self) -> i32 {
        let idx = self.active.pop().expect("pop with no open scope");
        let framelength = self.arena[idx].framelength();
        if let Some(enclosing) = self.arena[idx].enclosing_scope {
            let owner = self.arena[idx].owner_name.clone();
            if let Some(Entity {
                kind: EntityKind::Function { framelength: fl, .. },
                ..
            }) = self.find_in_scope_mut(enclosing, &owner, entity_is_function)
            {
                *fl = Some(framelength);
            }
        }
        framelength
    }

    fn find_in_scope_mut(
        &mut self,
        scope_idx: usize,
        name: &str,
        pred: fn(&Entity) -> bool,
    ) -> Option<&mut Entity> {
        self.arena[scope_idx]
            .entities
            .iter_mut()
            .find(|e| e.name == name && pred(e))
    }

    fn alloc_slot(&mut self) -> i32 {
        let idx = self.current_idx();
        let scope = &mut self.arena[idx];
        let off = scope.tmp_offset;
        scope.tmp_offset += SLOT_SIZE;
        off
    }

    /// Declares a `Function`/`Procedure` entity in the *current*
    /// (soon-to-be-enclosing) scope, per spec §4.3 — call this before
    /// `add_new_scope` for the subprogram's own body.
    pub fn declare_function(
        &mut self,
        name: &str,
        ret_type: RetType,
        pos: Pos,
    ) -> Result<(), CompileError> {
        let idx = self.current_idx();
        self.check_unique(idx, name, entity_is_function, pos)?;
        self.arena[idx].entities.push(Entity {
            name: name.to_string(),
            kind: EntityKind::Function {
                ret_type,
                start_quad: None,
                framelength: None,
                args: Vec::new(),
            },
            offset: None,
        });
        Ok(())
    }

    pub fn set_function_start_quad(&mut self, enclosing: usize, name: &str, start_quad: usize) {
        if let Some(Entity {
            kind: EntityKind::Function { start_quad: sq, .. },
            ..
        }) = self.find_in_scope_mut(enclosing, name, entity_is_function)
        {
            *sq = Some(start_quad);
        }
    }

    pub fn add_function_arg(&mut self, enclosing: usize, name: &str, mode: ParamMode) {
        if let Some(Entity {
            kind: EntityKind::Function { args, .. },
            ..
        }) = self.find_in_scope_mut(enclosing, name, entity_is_function)
        {
            args.push(Argument { mode });
        }
    }

    /// Declares a `Variable` in the current scope (spec §4.3).
    pub fn declare_variable(&mut self, name: &str, pos: Pos) -> Result<i32, CompileError> {
        let idx = self.current_idx();
        self.check_unique(idx, name, entity_is_variable, pos)?;
        self.check_no_cross_kind_collision(idx, name, entity_is_parameter, pos)?;
        let offset = self.alloc_slot();
        self.arena[idx].entities.push(Entity {
            name: name.to_string(),
            kind: EntityKind::Variable,
            offset: Some(offset),
        });
        Ok(offset)
    }

    /// Declares a `Parameter` in the current (subprogram) scope.
    pub fn declare_parameter(
        &mut self,
        name: &str,
        mode: ParamMode,
        pos: Pos,
    ) -> Result<i32, CompileError> {
        let idx = self.current_idx();
        self.check_unique(idx, name, entity_is_parameter, pos)?;
        self.check_no_cross_kind_collision(idx, name, entity_is_variable, pos)?;
        let offset = self.alloc_slot();
        self.arena[idx].entities.push(Entity {
            name: name.to_string(),
            kind: EntityKind::Parameter { mode },
            offset: Some(offset),
        });
        Ok(offset)
    }

    /// Allocates a fresh `Temporary` entity in the current scope, with
    /// the given interpreter-assigned name (`T_<n>`, spec §3).
    pub fn new_temp(&mut self, name: String) -> i32 {
        let idx = self.current_idx();
        let offset = self.alloc_slot();
        self.arena[idx].entities.push(Entity {
            name,
            kind: EntityKind::Temporary,
            offset: Some(offset),
        });
        offset
    }

    fn check_unique(
        &self,
        scope_idx: usize,
        name: &str,
        pred: fn(&Entity) -> bool,
        pos: Pos,
    ) -> Result<(), CompileError> {
        if self.arena[scope_idx]
            .entities
            .iter()
            .any(|e| e.name == name && pred(e))
        {
            return Err(CompileError::new(
                ErrorKind::Scope,
                pos,
                format!("'{name}' is already declared in this scope"),
            ));
        }
        Ok(())
    }

    fn check_no_cross_kind_collision(
        &self,
        scope_idx: usize,
        name: &str,
        other_pred: fn(&Entity) -> bool,
        pos: Pos,
    ) -> Result<(), CompileError> {
        if self.arena[scope_idx]
            .entities
            .iter()
            .any(|e| e.name == name && other_pred(e))
        {
            return Err(CompileError::new(
                ErrorKind::Scope,
                pos,
                format!("'{name}' collides with a parameter/variable of the same name"),
            ));
        }
        Ok(())
    }

    /// Walks from the current scope outward through `enclosing_scope`
    /// links and returns the first matching entity along with the
    /// nested level of the scope that declared it (spec §4.3). Name
    /// resolution is uniform across entity kinds: `Function` entities
    /// simply live one scope further out than their own body.
    pub fn lookup(&self, name: &str) -> Option<(&Entity, usize)> {
        self.lookup_from(self.current_idx(), name)
    }

    /// Same as `lookup`, but starting from an arbitrary (possibly closed)
    /// scope rather than the currently-open one. Used by the MIPS emitter,
    /// which resolves names inside a block after parsing has moved on
    /// (spec §9's "no ambient parser state" architecture).
    pub fn lookup_from(&self, start: usize, name: &str) -> Option<(&Entity, usize)> {
        let mut idx = Some(start);
        while let Some(i) = idx {
            let scope = &self.arena[i];
            if let Some(entity) = scope.entities.iter().find(|e| e.name == name) {
                return Some((entity, scope.nested_level));
            }
            idx = scope.enclosing_scope;
        }
        None
    }

    pub fn current_level(&self) -> usize {
        self.current().nested_level
    }

    /// Looks up the `Function` entity named `name` inside `scope_idx`,
    /// along with that scope's nested level (mirrors the reference's
    /// `search_entity(name, 'FUNCTION')`, which always finds a function
    /// in the scope enclosing its own body).
    pub fn find_function_in(&self, scope_idx: usize, name: &str) -> Option<(&Entity, usize)> {
        let scope = &self.arena[scope_idx];
        scope
            .entities
            .iter()
            .find(|e| e.name == name && entity_is_function(e))
            .map(|e| (e, scope.nested_level))
    }
}

/// Dumps the whole arena, one scope per line with its entities, oldest
/// first. A debugging aid only (mirrors `csc.py`'s `print_scopes`, which
/// the reference never wires into `main` either) — useful for writing
/// assertions about symbol table contents without reaching into private
/// fields.
impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, scope) in self.arena.iter().enumerate() {
            writeln!(
                f,
                "scope {idx} ({}) level={} framelength={}",
                scope.owner_name,
                scope.nested_level,
                scope.framelength()
            )?;
            for entity in &scope.entities {
                writeln!(f, "    {} : {:?}", entity.name, entity.kind)?;
            }
        }
        Ok(())
    }
}

fn entity_is_variable(e: &Entity) -> bool {
    matches!(e.kind, EntityKind::Variable)
}

fn entity_is_parameter(e: &Entity) -> bool {
    matches!(e.kind, EntityKind::Parameter { .. })
}

fn entity_is_function(e: &Entity) -> bool {
    matches!(e.kind, EntityKind::Function { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framelength_grows_by_four_per_slot() {
        let mut st = SymbolTable::new();
        st.add_new_scope("main");
        st.declare_variable("x", Pos::new(1, 1)).unwrap();
        st.declare_variable("y", Pos::new(1, 1)).unwrap();
        assert_eq!(st.pop_scope(), BASE_OFFSET + 2 * SLOT_SIZE);
    }

    #[test]
    fn redeclaring_same_name_same_kind_is_a_scope_error() {
        let mut st = SymbolTable::new();
        st.add_new_scope("main");
        st.declare_variable("x", Pos::new(1, 1)).unwrap();
        let err = st.declare_variable("x", Pos::new(2, 1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Scope);
    }

    #[test]
    fn variable_colliding_with_parameter_name_is_rejected() {
        let mut st = SymbolTable::new();
        st.add_new_scope("f");
        st.declare_parameter("x", ParamMode::Cv, Pos::new(1, 1))
            .unwrap();
        let err = st.declare_variable("x", Pos::new(2, 1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Scope);
    }

    #[test]
    fn lookup_walks_outward_through_enclosing_scopes() {
        let mut st = SymbolTable::new();
        st.add_new_scope("main");
        st.declare_variable("g", Pos::new(1, 1)).unwrap();
        st.add_new_scope("f");
        st.declare_variable("local", Pos::new(1, 1)).unwrap();
        let (entity, level) = st.lookup("g").unwrap();
        assert_eq!(entity.name, "g");
        assert_eq!(level, 0);
    }

    #[test]
    fn function_entity_is_visible_from_enclosing_scope_not_own_body() {
        let mut st = SymbolTable::new();
        st.add_new_scope("main");
        st.declare_function("f", RetType::Void, Pos::new(1, 1))
            .unwrap();
        let enclosing = st.current_idx();
        st.add_new_scope("f");
        st.declare_parameter("p", ParamMode::Cv, Pos::new(1, 1))
            .unwrap();
        st.add_function_arg(enclosing, "f", ParamMode::Cv);
        let (entity, _) = st.lookup("f").unwrap();
        match &entity.kind {
            EntityKind::Function { args, .. } => assert_eq!(args.len(), 1),
            _ => panic!("expected function entity"),
        }
    }

    #[test]
    fn pop_scope_sets_function_framelength() {
        let mut st = SymbolTable::new();
        st.add_new_scope("main");
        st.declare_function("f", RetType::Void, Pos::new(1, 1))
            .unwrap();
        let enclosing = st.current_idx();
        st.add_new_scope("f");
        st.declare_variable("x", Pos::new(1, 1)).unwrap();
        let fl = st.pop_scope();
        let (entity, _) = {
            self_lookup_in(&st, enclosing, "f")
        };
        match &entity.kind {
            EntityKind::Function { framelength, .. } => assert_eq!(*framelength, Some(fl)),
            _ => panic!("expected function entity"),
        }
    }

    fn self_lookup_in<'a>(st: &'a SymbolTable, idx: usize, name: &str) -> (&'a Entity, usize) {
        let e = st.scope(idx).entities.iter().find(|e| e.name == name).unwrap();
        (e, st.scope(idx).nested_level)
    }

    #[cfg(debug_assertions)]
    #[test]
    fn display_lists_every_scope_and_entity() {
        let mut st = SymbolTable::new();
        st.add_new_scope("main");
        st.declare_variable("x", Pos::new(1, 1)).unwrap();
        let dump = st.to_string();
        assert!(dump.contains("scope 0 (main)"));
        assert!(dump.contains("x : Variable"));
    }
}
