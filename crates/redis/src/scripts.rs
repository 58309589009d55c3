/// Lua script for the atomic daily consume.
///
/// KEYS\[1\] = the counter key
/// ARGV\[1\] = daily limit
/// ARGV\[2\] = TTL in seconds, applied only when the counter has no expiry
///
/// Returns a three-element array `{current, limit, allowed}`:
///   - `{current, limit, 0}` when the counter is already at or over the limit
///     (nothing is written)
///   - `{limit, limit, 0}` when the increment overshot and was rolled back
///   - `{new, limit, 1}` when a unit was consumed
///
/// A stored value that is not an integer produces an error reply.
pub const CONSUME: &str = r"
local limit = tonumber(ARGV[1])
local ttl = tonumber(ARGV[2])
local raw = redis.call('GET', KEYS[1])
local current = 0
if raw then
    current = tonumber(raw)
    if current == nil then
        return redis.error_reply('counter value is not an integer')
    end
end
if current >= limit then
    return {current, limit, 0}
end
local new = redis.call('INCR', KEYS[1])
if redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ttl)
end
if new > limit then
    redis.call('DECR', KEYS[1])
    return {limit, limit, 0}
end
return {new, limit, 1}
";
