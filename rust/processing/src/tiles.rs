// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! swissALTI3D elevation tile search and download.

use crate::error::TileError;
use async_trait::async_trait;
use geo2ifc_geometry::Bounds2;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// swisstopo STAC search endpoint for swissALTI3D assets.
pub const SWISSALTI3D_SEARCH_URL: &str =
    "https://ogd.swisstopo.admin.ch/services/swiseld/services/assets/ch.swisstopo.swissalti3d/search";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of elevation tiles covering an area.
#[async_trait]
pub trait TileService: Send + Sync {
    /// Store every tile intersecting `bounds` in `dest` and return the paths.
    async fn fetch_tiles(&self, bounds: &Bounds2, dest: &Path) -> Result<Vec<PathBuf>, TileError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    ass_asset_href: Option<String>,
}

/// Query parameters for a bounding box search.
pub fn search_query(bounds: &Bounds2) -> Vec<(&'static str, String)> {
    vec![
        (
            "format",
            "image/tiff; application=geotiff; profile=cloud-optimized".to_string(),
        ),
        ("resolution", "0.5".to_string()),
        ("srid", "2056".to_string()),
        ("state", "current".to_string()),
        ("xMin", bounds.min_x.to_string()),
        ("yMin", bounds.min_y.to_string()),
        ("xMax", bounds.max_x.to_string()),
        ("yMax", bounds.max_y.to_string()),
    ]
}

/// Asset URLs listed in a search response.
pub fn parse_search_response(body: &str) -> Result<Vec<String>, TileError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| TileError::InvalidResponse(e.to_string()))?;
    Ok(response
        .items
        .into_iter()
        .filter_map(|item| item.ass_asset_href)
        .filter(|href| !href.is_empty())
        .collect())
}

/// Local file name of a tile: the last path segment of its URL.
pub fn tile_file_name(href: &str) -> Result<String, TileError> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
        .ok_or_else(|| TileError::InvalidHref(href.to_string()))
}

/// HTTP client for the swisstopo data service.
pub struct SwissAlti3dClient {
    search_url: String,
    http: reqwest::Client,
}

impl SwissAlti3dClient {
    pub fn new() -> Result<Self, TileError> {
        Self::with_search_url(SWISSALTI3D_SEARCH_URL)
    }

    pub fn with_search_url(search_url: &str) -> Result<Self, TileError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(TileError::Client)?;
        Ok(Self {
            search_url: search_url.to_string(),
            http,
        })
    }

    /// Asset URLs of the tiles intersecting `bounds`.
    pub async fn search(&self, bounds: &Bounds2) -> Result<Vec<String>, TileError> {
        let url = self.search_url.clone();
        let resp = self
            .http
            .get(&url)
            .query(&search_query(bounds))
            .send()
            .await
            .map_err(|source| TileError::Request {
                url: url.clone(),
                source,
            })?;

        if !resp.status().is_success() {
            return Err(TileError::Status {
                url,
                status: resp.status().as_u16(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|source| TileError::Request { url, source })?;
        parse_search_response(&body)
    }

    /// Download one asset into `dest`.
    pub async fn download(&self, href: &str, dest: &Path) -> Result<PathBuf, TileError> {
        let path = dest.join(tile_file_name(href)?);
        let resp = self
            .http
            .get(href)
            .send()
            .await
            .map_err(|source| TileError::Request {
                url: href.to_string(),
                source,
            })?;

        if !resp.status().is_success() {
            return Err(TileError::Status {
                url: href.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let bytes = resp.bytes().await.map_err(|source| TileError::Request {
            url: href.to_string(),
            source,
        })?;
        tokio::fs::write(&path, &bytes).await?;
        tracing::debug!(url = href, path = %path.display(), bytes = bytes.len(), "Downloaded tile");
        Ok(path)
    }
}

#[async_trait]
impl TileService for SwissAlti3dClient {
    async fn fetch_tiles(&self, bounds: &Bounds2, dest: &Path) -> Result<Vec<PathBuf>, TileError> {
        let hrefs = self.search(bounds).await?;
        if hrefs.is_empty() {
            return Err(TileError::NoTiles);
        }
        tracing::info!(count = hrefs.len(), "Downloading swissALTI3D tiles");

        let mut paths = Vec::with_capacity(hrefs.len());
        for href in &hrefs {
            paths.push(self.download(href, dest).await?);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_carries_bbox_and_product_filters() {
        let q = search_query(&Bounds2::new(2600000.5, 1200000.0, 2600100.0, 1200050.25));
        let get = |k: &str| q.iter().find(|(key, _)| *key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("xMin"), Some("2600000.5"));
        assert_eq!(get("yMax"), Some("1200050.25"));
        assert_eq!(get("srid"), Some("2056"));
        assert_eq!(get("resolution"), Some("0.5"));
        assert_eq!(get("state"), Some("current"));
        assert_eq!(
            get("format"),
            Some("image/tiff; application=geotiff; profile=cloud-optimized")
        );
    }

    #[test]
    fn parses_asset_links() {
        let body = r#"{"items":[
            {"ass_asset_href":"https://data.geo.admin.ch/a/swissalti3d_2019_2600-1200_0.5_2056_5728.tif"},
            {"other":"x"},
            {"ass_asset_href":"https://data.geo.admin.ch/b/swissalti3d_2019_2601-1200_0.5_2056_5728.tif"}
        ]}"#;
        let hrefs = parse_search_response(body).unwrap();
        assert_eq!(hrefs.len(), 2);
        assert!(parse_search_response("{}").unwrap().is_empty());
        assert!(matches!(
            parse_search_response("not json"),
            Err(TileError::InvalidResponse(_))
        ));
    }

    #[test]
    fn file_names_come_from_the_last_segment() {
        assert_eq!(
            tile_file_name("https://h/x/swissalti3d_a.tif?sig=1").unwrap(),
            "swissalti3d_a.tif"
        );
        assert!(tile_file_name("https://h/x/").is_err());
    }
}
