#![allow(dead_code)]

use linkidx::{Article, Engine, EngineConfig};
use std::path::Path;

pub fn open_engine(dir: &Path) -> Engine {
    Engine::open(EngineConfig::new(dir)).unwrap()
}

/// Adds the articles in order, commits and refreshes the engine's view.
pub fn index(engine: &Engine, articles: &[Article]) {
    let mut writer = engine.writer().unwrap();
    for a in articles {
        engine.add_article(&mut writer, a).unwrap();
    }
    writer.commit().unwrap();
    drop(writer);
    engine.refresh().unwrap();
}

pub fn article(wid: u32, text: &str) -> Article {
    Article::with_content(wid, text)
}
