use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A generated audio artifact. The MP3 bytes live on disk under the audio
/// root at `file_key`; this row owns them, and deleting the row (directly or
/// via the user cascade) is what retires the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFile {
    pub id: Uuid,
    pub user_id: i64,
    pub voice_id: String,
    pub voice_name: String,
    pub title: String,
    pub char_count: i32,
    #[serde(skip_serializing)]
    pub file_key: String,
    pub bytes: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A provider voice offered for synthesis.
#[derive(Debug, Clone, Serialize)]
pub struct Voice {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// The fixed voice lineup. Also drives the sample-generation batch, which
/// writes one preview file per entry.
pub const VOICES: &[Voice] = &[
    Voice {
        id: "21m00Tcm4TlvDq8ikWAM",
        name: "Rachel",
        description: "Calm, young adult female",
    },
    Voice {
        id: "29vD33N1CtxCmqQRPOHJ",
        name: "Drew",
        description: "Well-rounded, middle-aged male",
    },
    Voice {
        id: "2EiwWnXFnvU5JabPnv8n",
        name: "Clyde",
        description: "War veteran, gravelly male",
    },
    Voice {
        id: "AZnzlk1XvdvUeBnXmlld",
        name: "Domi",
        description: "Strong, confident female",
    },
    Voice {
        id: "EXAVITQu4vr4xnSDxMaL",
        name: "Sarah",
        description: "Soft, news-anchor female",
    },
    Voice {
        id: "TxGEqnHWrfWFTfGW9XjX",
        name: "Josh",
        description: "Deep, narrative male",
    },
];

pub fn find_voice(voice_id: &str) -> Option<&'static Voice> {
    VOICES.iter().find(|voice| voice.id == voice_id)
}
