//! # Acting Identity
//!
//! Who is driving an operation. Session management itself is an external
//! collaborator; the engines only consume its result: the operator's
//! member identity and role, plus the member most recently authenticated
//! by RFID scan at the kiosk.

use kiosk_core::MemberRole;

/// The caller's authentication context, supplied by the session layer.
#[derive(Debug, Clone)]
pub struct ActingIdentity {
    /// Member account of the operator, when the caller is a signed-in
    /// member. Guests (anonymous cash buyers) have none.
    pub member_id: Option<String>,

    /// Role of the operator. Cashier/admin act on behalf of the store.
    pub role: MemberRole,

    /// Member pre-authenticated by RFID scan in the current kiosk session.
    /// Debit/credit settlements must name this member; the session layer
    /// clears it after the sale commits.
    pub scanned_member_id: Option<String>,
}

impl ActingIdentity {
    /// An anonymous kiosk session (cash sales only).
    pub fn guest() -> Self {
        ActingIdentity {
            member_id: None,
            role: MemberRole::Member,
            scanned_member_id: None,
        }
    }

    /// A member session with an RFID scan in context.
    pub fn member(member_id: impl Into<String>) -> Self {
        let id = member_id.into();
        ActingIdentity {
            member_id: Some(id.clone()),
            role: MemberRole::Member,
            scanned_member_id: Some(id),
        }
    }

    /// A staff session (cashier or admin) acting for the scanned member.
    pub fn staff(role: MemberRole, scanned_member_id: Option<String>) -> Self {
        ActingIdentity {
            member_id: None,
            role,
            scanned_member_id,
        }
    }
}
