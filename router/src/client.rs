//! Typed operations for the imagery data servers.

use crate::config::Config;
use crate::errors::Result;
use crate::operation::{MultipartForm, Operation};
use crate::router::FailoverRouter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Bounding box for an image search, in degrees.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct SearchArea {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

/// Pixel window of a tile request.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct TileBounds {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Clone)]
pub struct Client {
    router: Arc<FailoverRouter>,
    request_timeout: Duration,
    upload_timeout: Duration,
}

impl Client {
    pub fn new(router: Arc<FailoverRouter>, config: &Config) -> Self {
        Client {
            router,
            request_timeout: config.request_timeout(),
            upload_timeout: config.upload_timeout(),
        }
    }

    pub fn router(&self) -> &Arc<FailoverRouter> {
        &self.router
    }

    pub async fn process(&self, snapshot_id: &str, spectrum: &str) -> Result<Value> {
        let op = self
            .query("/process")
            .param("snapshot_id", snapshot_id)
            .param("spectrum", spectrum);
        self.router.dispatch(&op).await
    }

    pub async fn search(&self, area: &SearchArea) -> Result<Value> {
        let op = self
            .query("/search")
            .param("north", area.north)
            .param("south", area.south)
            .param("east", area.east)
            .param("west", area.west);
        self.router.dispatch(&op).await
    }

    pub async fn download(&self, spectrums: &[String]) -> Result<Value> {
        let op = self.query("/download").param("spectrums", spectrums.to_vec());
        self.router.dispatch(&op).await
    }

    pub async fn upload(&self, form: MultipartForm) -> Result<Value> {
        let op = Operation::upload("/upload", form, self.upload_timeout);
        self.router.dispatch(&op).await
    }

    pub async fn available_archives(&self) -> Result<Value> {
        self.router.dispatch(&self.query("/available-archives")).await
    }

    pub async fn view_image(&self, image_id: &str) -> Result<Value> {
        let op = self.query("/view-image").segment(image_id);
        self.router.dispatch(&op).await
    }

    pub async fn tile(&self, image_id: &str, bounds: &TileBounds) -> Result<Value> {
        let op = self
            .query("/tile")
            .segment(image_id)
            .param("x1", bounds.x1)
            .param("y1", bounds.y1)
            .param("x2", bounds.x2)
            .param("y2", bounds.y2);
        self.router.dispatch(&op).await
    }

    fn query(&self, path: &str) -> Operation {
        Operation::get(path, self.request_timeout)
    }
}
