use crate::store::{ChatSaver, SavedChat, StoreError, StoreResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Filesystem-backed persistence callback: one JSON file per chat,
/// written atomically via tmp + rename.
#[derive(Clone, Debug)]
pub struct FsChatSaver {
    root: PathBuf,
}

impl FsChatSaver {
    pub fn new<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        fs::create_dir_all(root.as_ref())
            .map_err(|err| StoreError::Backend(format!("create chat root failed: {err}")))?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    pub fn chat_path(&self, chat_id: &str) -> PathBuf {
        self.root.join(format!("{chat_id}.json"))
    }
}

#[async_trait::async_trait]
impl ChatSaver for FsChatSaver {
    async fn save(&self, chat: SavedChat) -> StoreResult<()> {
        let raw = serde_json::to_vec_pretty(&chat)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        let target = self.chat_path(&chat.id);
        let tmp = target.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .map_err(|err| StoreError::Backend(format!("write chat file failed: {err}")))?;
        fs::rename(&tmp, &target)
            .map_err(|err| StoreError::Backend(format!("rename chat file failed: {err}")))?;
        Ok(())
    }
}

/// Load a previously saved chat, e.g. for replay or history import.
pub fn load_chat<P: AsRef<Path>>(path: P) -> StoreResult<SavedChat> {
    let raw = fs::read(path.as_ref())
        .map_err(|err| StoreError::Backend(format!("read chat file failed: {err}")))?;
    serde_json::from_slice(&raw).map_err(|err| StoreError::Serialization(err.to_string()))
}
