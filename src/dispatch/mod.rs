//! Command dispatcher (component D): iterates a decoded message's command
//! list, invokes the matching handler, sequences their mutations of the
//! message, and emits the final response via the message codec.

pub mod handlers;

use std::collections::HashMap;

use crate::message::command::{id, is_known_command};
use crate::message::header::NTStatus;
use crate::message::Message;
use crate::server::connection::Connection;
use crate::server::server::Server;

/// What a handler hands back to the dispatcher after it runs. A tagged
/// variant instead of one catch-all struct, so the common case (a plain
/// reply) doesn't have to carry fields only the error path needs.
pub enum HandlerOutcome {
    /// Commit these params/data as the command's response. `word_count`/
    /// `byte_count` default to `params.len()/2` and `data.len()` when not
    /// overridden. `word_count` overrides only the serialized wordCount
    /// byte, not the param payload itself (NT_CREATE_ANDX's
    /// `wordCount=0x2a` clamp still emits the full extended-response
    /// params); `byte_count` does resize `data` when overridden.
    Reply {
        params: Vec<u8>,
        data: Vec<u8>,
        word_count: Option<u8>,
        byte_count: Option<u16>,
        /// SESSION_SETUP_ANDX's multi-leg NTLM negotiation: commits the
        /// response but also sets `header.status` to
        /// `MORE_PROCESSING_REQUIRED` rather than `SUCCESS`.
        more_processing: bool,
        /// SESSION_SETUP_ANDX/TREE_CONNECT_ANDX allocate a UID/TID that the
        /// client only learns from the response header, not the request.
        new_uid: Option<u16>,
        new_tid: Option<u16>,
    },
    /// Abort the chain; the failing command gets empty params/data and
    /// this status in the header.
    Error { status: NTStatus, message: String },
    /// The handler sent its own response already (e.g. ECHO); the
    /// dispatcher must not encode anything.
    AlreadyReplied,
}

impl HandlerOutcome {
    pub fn reply(params: Vec<u8>, data: Vec<u8>) -> Self {
        Self::Reply {
            params,
            data,
            word_count: None,
            byte_count: None,
            more_processing: false,
            new_uid: None,
            new_tid: None,
        }
    }

    pub fn more_processing(params: Vec<u8>, data: Vec<u8>) -> Self {
        Self::Reply {
            params,
            data,
            word_count: None,
            byte_count: None,
            more_processing: true,
            new_uid: None,
            new_tid: None,
        }
    }

    pub fn error(status: NTStatus, message: impl Into<String>) -> Self {
        Self::Error { status, message: message.into() }
    }

    /// Stamps the UID the response header should carry (SESSION_SETUP_ANDX).
    pub fn with_uid(mut self, uid: u16) -> Self {
        if let Self::Reply { new_uid, .. } = &mut self {
            *new_uid = Some(uid);
        }
        self
    }

    /// Stamps the TID the response header should carry (TREE_CONNECT_ANDX).
    pub fn with_tid(mut self, tid: u16) -> Self {
        if let Self::Reply { new_tid, .. } = &mut self {
            *new_tid = Some(tid);
        }
        self
    }
}

/// Everything a handler needs: the raw request fields plus mutable access
/// to the connection (session/tree tables) and read-only access to the
/// server (share table, user table).
pub struct HandlerContext<'a> {
    pub command_id: u8,
    pub params: &'a [u8],
    pub data: &'a [u8],
    pub params_offset: u32,
    pub data_offset: u32,
    pub header_tid: u16,
    pub header_uid: u16,
    pub connection: &'a mut Connection,
    pub server: &'a Server,
}

#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> HandlerOutcome;
}

pub type Registry = HashMap<u8, Box<dyn Handler>>;

/// Builds the static command-id -> handler table, populated once at
/// startup from a compile-time list. Called once per connection.
pub fn build_registry() -> Registry {
    let mut registry: Registry = HashMap::new();
    registry.insert(id::NEGOTIATE, Box::new(handlers::negotiate::NegotiateHandler));
    registry.insert(id::SESSION_SETUP_ANDX, Box::new(handlers::session_setup::SessionSetupHandler));
    registry.insert(id::TREE_CONNECT_ANDX, Box::new(handlers::tree_connect::TreeConnectHandler));
    registry.insert(id::TREE_DISCONNECT, Box::new(handlers::tree_connect::TreeDisconnectHandler));
    registry.insert(id::NT_CREATE_ANDX, Box::new(handlers::create::CreateHandler));
    registry.insert(id::READ_ANDX, Box::new(handlers::read::ReadHandler));
    registry.insert(id::WRITE_ANDX, Box::new(handlers::write::WriteHandler));
    registry.insert(id::CLOSE, Box::new(handlers::close::CloseHandler));
    registry.insert(id::DELETE, Box::new(handlers::delete::DeleteHandler));
    registry.insert(id::TRANS2, Box::new(handlers::trans2::Trans2Handler));
    registry.insert(id::ECHO, Box::new(handlers::echo::EchoHandler));
    registry
}

/// Runs every command in `msg` through the registry, in order. AndX chains
/// arrive as multiple entries in `msg.commands`; each is dispatched and
/// patched independently, and `Message::encode` fixes up the AndX offsets
/// afterward.
pub async fn dispatch(msg: &mut Message, registry: &Registry, connection: &mut Connection, server: &Server) {
    let mut failure: Option<NTStatus> = None;
    let command_count = msg.commands.len();

    for i in 0..command_count {
        if msg.processed {
            break;
        }
        let command_id = msg.commands[i].command_id;
        let handler = match registry.get(&command_id) {
            Some(h) => h,
            None => {
                // A command id absent from MS-CIFS entirely is a protocol
                // violation; a real command id this server just never
                // registered a handler for is merely unimplemented.
                let status = if is_known_command(command_id) {
                    NTStatus::NotImplemented
                } else {
                    NTStatus::SmbBadCommand
                };
                failure = Some(status);
                msg.commands[i].params.clear();
                msg.commands[i].data.clear();
                break;
            }
        };

        let (params, data, params_offset, data_offset) = {
            let cmd = &msg.commands[i];
            (cmd.params.clone(), cmd.data.clone(), cmd.params_offset, cmd.data_offset)
        };

        let mut ctx = HandlerContext {
            command_id,
            params: &params,
            data: &data,
            params_offset,
            data_offset,
            header_tid: msg.header.tid,
            header_uid: msg.header.uid,
            connection,
            server,
        };

        match handler.handle(&mut ctx).await {
            HandlerOutcome::Reply { params, data, word_count, byte_count, more_processing, new_uid, new_tid } => {
                let cmd = &mut msg.commands[i];
                cmd.params = params;
                cmd.data = data;
                // Overrides only the serialized wordCount byte; the full
                // param payload a handler built (e.g. NT_CREATE_ANDX's
                // extended-response tail) still goes out on the wire.
                cmd.word_count_override = word_count;
                if let Some(bc) = byte_count {
                    cmd.data.resize(bc as usize, 0);
                }
                if more_processing {
                    msg.header.status = NTStatus::MoreProcessingRequired;
                }
                if let Some(uid) = new_uid {
                    msg.header.uid = uid;
                }
                if let Some(tid) = new_tid {
                    msg.header.tid = tid;
                }
            }
            HandlerOutcome::Error { status, .. } => {
                msg.commands[i].params.clear();
                msg.commands[i].data.clear();
                failure = Some(status);
                break;
            }
            HandlerOutcome::AlreadyReplied => {
                msg.processed = true;
                break;
            }
        }
    }

    if msg.processed {
        return;
    }

    if let Some(status) = failure {
        msg.header.status = status;
    } else if msg.header.status != NTStatus::MoreProcessingRequired {
        msg.header.status = NTStatus::Success;
    }
    msg.header.apply_response_flags();
}

/// Shared precondition check for every handler that needs a resolved tree.
pub fn resolve_tree<'a>(connection: &'a Connection, tid: u16) -> Result<&'a std::sync::Arc<dyn crate::share::Tree>, HandlerOutcome> {
    connection
        .trees
        .get(&tid)
        .ok_or_else(|| HandlerOutcome::error(NTStatus::SmbBadTid, "TID does not resolve to a tree"))
}
