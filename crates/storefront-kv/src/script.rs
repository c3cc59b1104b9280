//! Atomic server-side scripts.
//!
//! Every multi-step mutation of shared KV state goes through one of these. Redis
//! runs the Lua source; [`crate::MemoryKvStore`] runs a native equivalent under
//! its store lock.

/// The closed set of scripts a [`crate::KvStore`] can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KvScript {
    /// Delete a lock key only if it still holds the caller's holder id.
    ///
    /// KEYS: `[lock_key]`, ARGV: `[holder_id]`. Returns 1 if deleted, 0 otherwise.
    ReleaseLock,

    /// Check and reserve one unit of voucher stock for a user.
    ///
    /// KEYS: `[stock_key, admitted_set_key, (stream_key)]`,
    /// ARGV: `[user_id, field, value, field, value, ...]`.
    ///
    /// When a stream key is passed, the field/value pairs are appended to it in
    /// the same atomic step. Returns an [`AdmitStatus`] code.
    Admit,

    /// Undo a reservation made by [`KvScript::Admit`].
    ///
    /// KEYS: `[stock_key, admitted_set_key]`, ARGV: `[user_id]`. Returns 1 if
    /// the user was removed and the unit returned to stock, 0 otherwise.
    CancelAdmit,
}

const RELEASE_LOCK_LUA: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
end
return 0
"#;

const ADMIT_LUA: &str = r#"
if redis.call('sismember', KEYS[2], ARGV[1]) == 1 then
    return 2
end
local stock = tonumber(redis.call('get', KEYS[1]))
if stock == nil or stock <= 0 then
    return 1
end
redis.call('incrby', KEYS[1], -1)
redis.call('sadd', KEYS[2], ARGV[1])
if #KEYS > 2 then
    redis.call('xadd', KEYS[3], '*', unpack(ARGV, 2))
end
return 0
"#;

const CANCEL_ADMIT_LUA: &str = r#"
if redis.call('srem', KEYS[2], ARGV[1]) == 1 then
    redis.call('incr', KEYS[1])
    return 1
end
return 0
"#;

impl KvScript {
    /// Lua source executed by Redis.
    pub fn lua(&self) -> &'static str {
        match self {
            Self::ReleaseLock => RELEASE_LOCK_LUA,
            Self::Admit => ADMIT_LUA,
            Self::CancelAdmit => CANCEL_ADMIT_LUA,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ReleaseLock => "release_lock",
            Self::Admit => "admit",
            Self::CancelAdmit => "cancel_admit",
        }
    }
}

/// Status codes returned by [`KvScript::Admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitStatus {
    Reserved,
    SoldOut,
    Duplicate,
}

impl AdmitStatus {
    pub const RESERVED: i64 = 0;
    pub const SOLD_OUT: i64 = 1;
    pub const DUPLICATE: i64 = 2;

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            Self::RESERVED => Some(Self::Reserved),
            Self::SOLD_OUT => Some(Self::SoldOut),
            Self::DUPLICATE => Some(Self::Duplicate),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Reserved => Self::RESERVED,
            Self::SoldOut => Self::SOLD_OUT,
            Self::Duplicate => Self::DUPLICATE,
        }
    }
}
