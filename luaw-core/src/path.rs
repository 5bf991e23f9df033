//! 点分路径导航
//!
//! `a.b.c` 按 `.` 切分后逐段查找。容器与所有中间值都必须是表；
//! 查找经过 `__index`，最终写入经过 `__newindex`，两者都在受保护模式下运行，
//! 元方法抛出的错误以 [`LuaError::Runtime`] 返回。
//! 失败时栈恢复到进入时的深度，不会留下半途的中间值。

use std::ffi::c_int;

use tracing::debug;

use crate::codec::{Decode, Encode};
use crate::error::LuaError;
use crate::ffi;
use crate::stack::StackGuard;
use crate::state::{Lua, Tag};
use crate::targets;

fn not_found(path: &str, segment: &str) -> LuaError {
    debug!(target: targets::PATH, path, segment, "field not found");
    LuaError::FieldNotFound {
        path: path.to_string(),
        segment: segment.to_string(),
    }
}

/// 空路径或空段（如 `a..b`）不是合法路径
fn split_path(path: &str) -> Result<Vec<&str>, LuaError> {
    let segments: Vec<&str> = path.split('.').collect();
    if path.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(not_found(path, ""));
    }
    Ok(segments)
}

/// 受保护的 `t[k]`：参数为表和键
unsafe extern "C-unwind" fn index_field(state: *mut ffi::lua_State) -> c_int {
    ffi::lua_gettable(state, 1);
    1
}

/// 受保护的 `t[k] = v`：参数为表、键和值
unsafe extern "C-unwind" fn assign_field(state: *mut ffi::lua_State) -> c_int {
    ffi::lua_settable(state, 1);
    0
}

impl Lua {
    /// 把栈顶的表替换为它的 `segment` 字段
    ///
    /// 查找经过 `__index`，在受保护模式下进行；失败时表被弹出。
    fn descend(&self, segment: &str) -> Result<(), LuaError> {
        self.push(segment);
        self.protected(index_field, 2, 1).map_err(|e| {
            debug!(target: targets::PATH, segment, error = %e, "__index failed");
            e
        })
    }

    /// 读取路径上的值并压栈：成功 +1，失败 +0
    ///
    /// 最后一段缺失时压入 nil 并视为成功（与普通字段读取一致）。
    pub fn get_field(&self, index: c_int, path: &str) -> Result<(), LuaError> {
        let segments = split_path(path)?;
        let index = self.abs_index(index);

        let guard = StackGuard::new(self);
        self.reserve(3)?;
        self.push_copy(index);
        if self.tag(-1) != Tag::Table {
            return Err(not_found(path, segments[0]));
        }

        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            self.descend(segment)?;
            if i < last && self.tag(-1) != Tag::Table {
                return Err(not_found(path, segment));
            }
        }

        debug!(target: targets::PATH, path, found = %self.tag(-1), "field read");
        guard.keep(1);
        Ok(())
    }

    /// 每一段都能解析且最终值不是 nil：+0，从不失败
    pub fn has_field(&self, index: c_int, path: &str) -> bool {
        if self.get_field(index, path).is_err() {
            return false;
        }
        let present = self.tag(-1) != Tag::Nil;
        self.pop_n(1);
        present
    }

    /// 把栈顶的值写到路径上：两条路径上都消耗该值（-1）
    ///
    /// 中间段必须已经存在且是表，不会自动创建。
    pub fn set_field(&self, index: c_int, path: &str) -> Result<(), LuaError> {
        let index = self.abs_index(index);
        let value = self.top();
        let guard = StackGuard::at(self, value - 1);

        let segments = split_path(path)?;
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return Err(not_found(path, "")),
        };

        self.reserve(4)?;
        self.push_copy(index);
        if self.tag(-1) != Tag::Table {
            return Err(not_found(path, segments[0]));
        }
        for segment in parents {
            self.descend(segment)?;
            if self.tag(-1) != Tag::Table {
                return Err(not_found(path, segment));
            }
        }

        self.push(*last);
        self.push_copy(value);
        self.protected(assign_field, 3, 0)?;

        debug!(target: targets::PATH, path, "field written");
        drop(guard);
        Ok(())
    }

    /// 读取并解码路径上的值：+0
    pub fn field<T: Decode>(&self, index: c_int, path: &str) -> Result<T, LuaError> {
        self.get_field(index, path)?;
        Ok(self.pop::<T>())
    }

    /// 编码 `value` 并写到路径上：+0
    pub fn set_field_value<T: Encode + ?Sized>(
        &self,
        index: c_int,
        path: &str,
        value: &T,
    ) -> Result<(), LuaError> {
        let index = self.abs_index(index);
        self.push(value);
        self.set_field(index, path)
    }
}
