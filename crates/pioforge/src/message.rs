//! Message type tags the client and server exchange.

// Client → server
pub const JOIN: &str = "join";
pub const AUTH: &str = "auth";
pub const QUEST_PROGRESS: &str = "qp";
pub const INIT_COMPLETE: &str = "ic";
pub const SAVE: &str = "s";
pub const REQUEST_ZOMBIE_ATTACK: &str = "rza";
pub const REQUEST_SURVIVOR_CHECK: &str = "rsc";

// Server → client
pub const JOIN_RESULT: &str = "playerio.joinresult";
pub const GAME_READY: &str = "gr";
pub const TIME_UPDATE: &str = "tu";
pub const SAVE_RESPONSE: &str = "r";
pub const ZOMBIE_ATTACK: &str = "za";
pub const SURVIVOR_NEW: &str = "srvnew";
pub const BUILDING_COMPLETE: &str = "bc";
pub const TASK_COMPLETE: &str = "tc";
pub const MISSION_RETURN_COMPLETE: &str = "mrc";
pub const BATCH_RECYCLE_COMPLETE: &str = "brc";

/// Sent for a message nobody handles, so the client does not wait on it.
pub const UNHANDLED_REPLY: &str = "\0\0\0\0";

/// First bytes of a Flash cross-domain policy request.
pub const POLICY_FILE_REQUEST: &[u8] = b"<policy-file-request/>";

/// The cross-domain policy allowing any origin on `port`.
pub fn policy_file_response(port: u16) -> Vec<u8> {
    format!(
        "<cross-domain-policy><allow-access-from domain=\"*\" to-ports=\"{port}\"/></cross-domain-policy>\0"
    )
    .into_bytes()
}
