//! 组合类型：序列、可选值、元组、映射
//!
//! 所有实现先把相对索引转换为绝对索引，再压入临时槽位；
//! 每个临时槽位在读取后立即弹出。每一层嵌套在压入前预留自己的槽位：
//! `is` 在栈无法增长时返回 false，编码与解码按 [`Lua::push`] 的约定增长。

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ffi::c_int;
use std::hash::{BuildHasher, Hash};

use super::{Check, Decode, Encode};
use crate::error::LuaError;
use crate::ffi;
use crate::state::{Lua, Tag};

// ==================== 序列 ====================

fn push_sequence<'a, T, I>(lua: &Lua, len: usize, items: I)
where
    T: Encode + 'a,
    I: Iterator<Item = &'a T>,
{
    let raw = lua.raw();
    unsafe { ffi::lua_createtable(raw, c_int::try_from(len).unwrap_or(0), 0) };
    lua.grow(1);
    for (i, item) in items.enumerate() {
        item.push(lua);
        unsafe { ffi::lua_rawseti(raw, -2, i as ffi::lua_Integer + 1) };
    }
}

fn is_sequence<T: Check>(lua: &Lua, index: c_int) -> bool {
    if lua.tag(index) != Tag::Table {
        return false;
    }
    let index = lua.abs_index(index);
    (1..=lua.len(index)).all(|i| element_is::<T>(lua, index, i))
}

fn decode_sequence<T: Decode>(lua: &Lua, index: c_int, mut sink: impl FnMut(T)) {
    if lua.tag(index) != Tag::Table {
        return;
    }
    let index = lua.abs_index(index);
    for i in 1..=lua.len(index) {
        sink(element_to::<T>(lua, index, i));
    }
}

/// `table[i]` 是否可以解码为 `T`（调用方保证 `index` 是绝对索引）
fn element_is<T: Check>(lua: &Lua, index: c_int, i: ffi::lua_Integer) -> bool {
    if lua.reserve(1).is_err() {
        return false;
    }
    unsafe { ffi::lua_rawgeti(lua.raw(), index, i) };
    let ok = T::is(lua, -1);
    lua.pop_n(1);
    ok
}

/// 解码 `table[i]`；容器不是表时按 nil 解码
fn element_to<T: Decode>(lua: &Lua, index: c_int, i: ffi::lua_Integer) -> T {
    lua.grow(1);
    if lua.tag(index) == Tag::Table {
        unsafe { ffi::lua_rawgeti(lua.raw(), index, i) };
    } else {
        lua.push_nil();
    }
    lua.pop::<T>()
}

impl<T: Encode> Encode for [T] {
    fn push(&self, lua: &Lua) {
        push_sequence(lua, self.len(), self.iter());
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn push(&self, lua: &Lua) {
        push_sequence(lua, self.len(), self.iter());
    }
}

impl<T: Encode> Encode for VecDeque<T> {
    fn push(&self, lua: &Lua) {
        push_sequence(lua, self.len(), self.iter());
    }
}

impl<T: Check> Check for Vec<T> {
    fn is(lua: &Lua, index: c_int) -> bool {
        is_sequence::<T>(lua, index)
    }
}

impl<T: Check> Check for VecDeque<T> {
    fn is(lua: &Lua, index: c_int) -> bool {
        is_sequence::<T>(lua, index)
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn to(lua: &Lua, index: c_int) -> Self {
        let mut items = Vec::new();
        decode_sequence(lua, index, |item| Vec::push(&mut items, item));
        items
    }
}

impl<T: Decode> Decode for VecDeque<T> {
    fn to(lua: &Lua, index: c_int) -> Self {
        let mut items = VecDeque::new();
        decode_sequence(lua, index, |item| items.push_back(item));
        items
    }
}

// ==================== 可选值 ====================
//
// None 编码为 nil，Some(v) 直接编码 v（无包装）：
// Some(None) 与 None 在 VM 中无法区分。

impl<T: Encode> Encode for Option<T> {
    fn push(&self, lua: &Lua) {
        match self {
            Some(value) => value.push(lua),
            None => lua.push_nil(),
        }
    }
}

impl<T: Check> Check for Option<T> {
    fn is(lua: &Lua, index: c_int) -> bool {
        lua.tag(index) == Tag::Nil || T::is(lua, index)
    }
}

impl<T: Decode> Decode for Option<T> {
    fn to(lua: &Lua, index: c_int) -> Self {
        if lua.tag(index) == Tag::Nil {
            None
        } else {
            Some(T::to(lua, index))
        }
    }
}

// ==================== 元组 ====================

macro_rules! impl_tuple {
    ($len:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            fn push(&self, lua: &Lua) {
                let raw = lua.raw();
                unsafe { ffi::lua_createtable(raw, $len, 0) };
                lua.grow(1);
                $(
                    self.$idx.push(lua);
                    unsafe { ffi::lua_rawseti(raw, -2, $idx + 1) };
                )+
            }
        }

        impl<$($name: Check),+> Check for ($($name,)+) {
            fn is(lua: &Lua, index: c_int) -> bool {
                if lua.tag(index) != Tag::Table || lua.len(index) != $len {
                    return false;
                }
                let index = lua.abs_index(index);
                $(element_is::<$name>(lua, index, $idx + 1))&&+
            }
        }

        impl<$($name: Decode),+> Decode for ($($name,)+) {
            fn to(lua: &Lua, index: c_int) -> Self {
                let index = lua.abs_index(index);
                ($(element_to::<$name>(lua, index, $idx + 1),)+)
            }
        }
    };
}

impl_tuple!(1; A: 0);
impl_tuple!(2; A: 0, B: 1);
impl_tuple!(3; A: 0, B: 1, C: 2);
impl_tuple!(4; A: 0, B: 1, C: 2, D: 3);
impl_tuple!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
impl_tuple!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_tuple!(7; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_tuple!(8; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

// ==================== 映射 ====================

fn push_map<'a, K, V, I>(lua: &Lua, len: usize, entries: I)
where
    K: Encode + 'a,
    V: Encode + 'a,
    I: Iterator<Item = (&'a K, &'a V)>,
{
    let raw = lua.raw();
    unsafe { ffi::lua_createtable(raw, 0, c_int::try_from(len).unwrap_or(0)) };
    lua.grow(2);
    for (key, value) in entries {
        key.push(lua);
        // nil 与 NaN 不能作为表键
        if !is_valid_key(lua, -1) {
            lua.pop_n(1);
            continue;
        }
        value.push(lua);
        unsafe { ffi::lua_rawset(raw, -3) };
    }
}

fn is_valid_key(lua: &Lua, index: c_int) -> bool {
    match lua.tag(index) {
        Tag::Nil => false,
        Tag::Number => !lua.to::<f64>(index).is_nan(),
        _ => true,
    }
}

fn is_map<K: Check, V: Check>(lua: &Lua, index: c_int) -> bool {
    lua.for_each_pair(index, |lua| {
        if K::is(lua, -2) && V::is(lua, -1) {
            Ok(())
        } else {
            Err(LuaError::TypeMismatch {
                expected: std::any::type_name::<(K, V)>(),
                found: lua.tag(-1),
            })
        }
    })
    .is_ok()
}

fn decode_map<K: Decode, V: Decode>(lua: &Lua, index: c_int, mut sink: impl FnMut(K, V)) {
    // 非表时遍历直接报错，结果为空映射
    let _ = lua.for_each_pair(index, |lua| {
        sink(K::to(lua, -2), V::to(lua, -1));
        Ok::<(), LuaError>(())
    });
}

impl<K: Encode, V: Encode, S> Encode for HashMap<K, V, S> {
    fn push(&self, lua: &Lua) {
        push_map(lua, self.len(), self.iter());
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn push(&self, lua: &Lua) {
        push_map(lua, self.len(), self.iter());
    }
}

impl<K: Check, V: Check, S> Check for HashMap<K, V, S> {
    fn is(lua: &Lua, index: c_int) -> bool {
        is_map::<K, V>(lua, index)
    }
}

impl<K: Check, V: Check> Check for BTreeMap<K, V> {
    fn is(lua: &Lua, index: c_int) -> bool {
        is_map::<K, V>(lua, index)
    }
}

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: Decode + Eq + Hash,
    V: Decode,
    S: BuildHasher + Default,
{
    fn to(lua: &Lua, index: c_int) -> Self {
        let mut map = HashMap::with_hasher(S::default());
        decode_map(lua, index, |k, v| {
            map.insert(k, v);
        });
        map
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn to(lua: &Lua, index: c_int) -> Self {
        let mut map = BTreeMap::new();
        decode_map(lua, index, |k, v| {
            map.insert(k, v);
        });
        map
    }
}
