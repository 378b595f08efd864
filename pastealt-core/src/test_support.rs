use std::sync::{Arc, Mutex};

use crate::{
    engine::{EngineParts, HistoryEngine},
    image_codec::RawImage,
    item::ClipboardItem,
    persist::{MemoryPersistence, Persistence},
    platform::{ClipboardAccess, FrontmostApp, PlatformError},
    settings::Settings,
};

pub fn text_item(content: &str, created_at: u64) -> ClipboardItem {
    ClipboardItem::from_text(content.to_owned(), None, created_at)
}

pub fn solid_image(width: usize, height: usize, pixel: [u8; 4]) -> RawImage {
    RawImage {
        width,
        height,
        rgba: pixel.repeat(width * height),
    }
}

#[derive(Debug, Default)]
pub struct ClipboardState {
    pub text: Option<String>,
    pub image: Option<RawImage>,
    pub fail_reads: bool,
    pub text_reads: usize,
    pub text_writes: Vec<String>,
    pub image_writes: Vec<RawImage>,
}

/// Clipboard double whose contents the test mutates between ticks.
#[derive(Debug, Clone, Default)]
pub struct FakeClipboard {
    pub state: Arc<Mutex<ClipboardState>>,
}

impl FakeClipboard {
    pub fn set_text(&self, text: &str) {
        let mut state = self.state.lock().unwrap();
        state.text = Some(text.to_owned());
        state.image = None;
    }

    pub fn set_image(&self, image: RawImage) {
        let mut state = self.state.lock().unwrap();
        state.image = Some(image);
        state.text = None;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn text_reads(&self) -> usize {
        self.state.lock().unwrap().text_reads
    }

    pub fn last_text_write(&self) -> Option<String> {
        self.state.lock().unwrap().text_writes.last().cloned()
    }
}

impl ClipboardAccess for FakeClipboard {
    fn read_text(&mut self) -> Result<Option<String>, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.text_reads += 1;
        if state.fail_reads {
            return Err(PlatformError::Clipboard("locked".to_owned()));
        }
        Ok(state.text.clone())
    }

    fn read_image(&mut self) -> Result<Option<RawImage>, PlatformError> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(PlatformError::Clipboard("locked".to_owned()));
        }
        Ok(state.image.clone())
    }

    fn write_text(&mut self, text: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.text = Some(text.to_owned());
        state.image = None;
        state.text_writes.push(text.to_owned());
        Ok(())
    }

    fn write_image(&mut self, image: &RawImage) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.image = Some(image.clone());
        state.text = None;
        state.image_writes.push(image.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeFrontmost {
    pub name: Arc<Mutex<Option<String>>>,
}

impl FakeFrontmost {
    pub fn set(&self, name: Option<&str>) {
        *self.name.lock().unwrap() = name.map(str::to_owned);
    }
}

impl FrontmostApp for FakeFrontmost {
    fn frontmost_app_name(&self) -> Option<String> {
        self.name.lock().unwrap().clone()
    }
}

pub struct Harness {
    pub engine: HistoryEngine,
    pub clipboard: FakeClipboard,
    pub frontmost: FakeFrontmost,
    pub persistence: Arc<MemoryPersistence>,
}

pub fn harness(settings: Settings) -> Harness {
    harness_with(Arc::new(MemoryPersistence::new()), settings)
}

pub fn harness_with(persistence: Arc<MemoryPersistence>, settings: Settings) -> Harness {
    persistence.save_settings(&settings).unwrap();
    let clipboard = FakeClipboard::default();
    let frontmost = FakeFrontmost::default();
    let engine = HistoryEngine::open(EngineParts {
        persistence: persistence.clone(),
        clipboard: Box::new(clipboard.clone()),
        frontmost: Box::new(frontmost.clone()),
    });
    Harness {
        engine,
        clipboard,
        frontmost,
        persistence,
    }
}
