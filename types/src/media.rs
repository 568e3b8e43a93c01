/// A unique identifier for a media device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MediaDeviceId(String);

impl MediaDeviceId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Information about a media device.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MediaDeviceInfo {
    id: MediaDeviceId,
    name: String,
}

impl MediaDeviceInfo {
    pub fn new(id: MediaDeviceId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }

    pub fn id(&self) -> &MediaDeviceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// Two descriptors of the same device compare equal even if its label changed.
impl PartialEq for MediaDeviceInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MediaDeviceInfo {}

/// An identifier for a media track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MediaTrackId(String);

impl MediaTrackId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// A unique identifier for a session participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Information about a session participant.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Participant {
    id: ParticipantId,
    name: Option<String>,
    /// True if this participant represents the local user.
    local: bool,
}

impl Participant {
    pub fn new(id: ParticipantId, name: Option<&str>, local: bool) -> Self {
        Self {
            id,
            name: name.map(str::to_string),
            local,
        }
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_local(&self) -> bool {
        self.local
    }
}

/// Media tracks associated with a participant.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParticipantTracks {
    audio: Option<MediaTrackId>,
    video: Option<MediaTrackId>,
}

impl ParticipantTracks {
    pub fn new(audio: Option<MediaTrackId>, video: Option<MediaTrackId>) -> Self {
        Self { audio, video }
    }

    pub fn audio(&self) -> Option<&MediaTrackId> {
        self.audio.as_ref()
    }

    pub fn video(&self) -> Option<&MediaTrackId> {
        self.video.as_ref()
    }
}

/// Media tracks for the local user and remote bot.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tracks {
    local: ParticipantTracks,
    bot: Option<ParticipantTracks>,
}

impl Tracks {
    pub fn new(local: ParticipantTracks, bot: Option<ParticipantTracks>) -> Self {
        Self { local, bot }
    }

    pub fn local(&self) -> &ParticipantTracks {
        &self.local
    }

    pub fn bot(&self) -> Option<&ParticipantTracks> {
        self.bot.as_ref()
    }
}
