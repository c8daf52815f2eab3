//! Fake collaborators shared by the unit tests.

use crate::collaborators::{
    AccessManager, IndexLookup, IndexedAttributes, LookupError, RecordResolver, Session,
};
use attach_ids::{RecordId, RecordUuid};
use attach_types::{ApprovalState, Visibility};
use std::collections::HashMap;

#[derive(Clone, Debug)]
enum Grant {
    Everyone,
    Nobody,
    Users(Vec<String>),
}

impl Grant {
    fn allows(&self, session: &Session) -> bool {
        match self {
            Grant::Everyone => true,
            Grant::Nobody => false,
            Grant::Users(users) => session
                .user()
                .is_some_and(|user| users.iter().any(|u| u == user)),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct FakeAccess {
    readers: Grant,
    editors: Grant,
    public_only: bool,
}

impl FakeAccess {
    pub(crate) fn everyone() -> Self {
        Self {
            readers: Grant::Everyone,
            editors: Grant::Everyone,
            public_only: false,
        }
    }

    pub(crate) fn nobody() -> Self {
        Self {
            readers: Grant::Nobody,
            editors: Grant::Nobody,
            public_only: false,
        }
    }

    pub(crate) fn readers_only() -> Self {
        Self {
            readers: Grant::Everyone,
            editors: Grant::Nobody,
            public_only: false,
        }
    }

    /// Everyone may download public resources; nobody may edit.
    pub(crate) fn public_downloads_only() -> Self {
        Self {
            public_only: true,
            ..Self::readers_only()
        }
    }

    /// Everyone may download; only `user` may edit.
    pub(crate) fn editors(user: &str) -> Self {
        Self {
            readers: Grant::Everyone,
            editors: Grant::Users(vec![user.to_string()]),
            public_only: false,
        }
    }
}

impl AccessManager for FakeAccess {
    fn can_download(&self, session: &Session, _record_id: RecordId, visibility: Visibility) -> bool {
        (!self.public_only || visibility == Visibility::Public) && self.readers.allows(session)
    }

    fn can_edit(&self, session: &Session, _record_id: RecordId) -> bool {
        self.editors.allows(session)
    }
}

/// Resolves registered UUIDs in any approval state.
#[derive(Clone, Debug, Default)]
pub(crate) struct FakeResolver {
    records: HashMap<RecordUuid, RecordId>,
}

impl FakeResolver {
    pub(crate) fn with(mut self, uuid: &RecordUuid, id: RecordId) -> Self {
        self.records.insert(uuid.clone(), id);
        self
    }
}

impl RecordResolver for FakeResolver {
    fn resolve_record_id(&self, uuid: &RecordUuid, _approval: ApprovalState) -> Option<RecordId> {
        self.records.get(uuid).copied()
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct FakeIndex {
    documents: HashMap<RecordUuid, IndexedAttributes>,
    unavailable: bool,
}

impl FakeIndex {
    pub(crate) fn with(mut self, uuid: &RecordUuid, attributes: IndexedAttributes) -> Self {
        self.documents.insert(uuid.clone(), attributes);
        self
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            documents: HashMap::new(),
            unavailable: true,
        }
    }
}

impl IndexLookup for FakeIndex {
    fn indexed_attributes(&self, uuid: &RecordUuid) -> Result<IndexedAttributes, LookupError> {
        if self.unavailable {
            return Err(LookupError::Unavailable("connection refused".into()));
        }
        self.documents
            .get(uuid)
            .cloned()
            .ok_or_else(|| LookupError::NotIndexed(uuid.to_string()))
    }
}
