// Copyright (c) 2023 Elektrobit Automotive GmbH
//
// This program and the accompanying materials are made available under the
// terms of the Apache License, Version 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0.
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations
// under the License.
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    fmt,
    fs::read_to_string,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;

pub const CONFIG_VERSION: &str = "v1";

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ConversionErrors {
    WrongVersion(String),
    InvalidConfig(String),
}

impl fmt::Display for ConversionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionErrors::WrongVersion(version) => write!(
                f,
                "Unsupported config version '{version}', expected '{CONFIG_VERSION}'"
            ),
            ConversionErrors::InvalidConfig(msg) => write!(f, "Invalid config file: {msg}"),
        }
    }
}

/// A TOML config file carrying a `version` key.
pub trait ConfigFile: Default + DeserializeOwned {
    fn version(&self) -> &str;

    fn from_file(file_path: &Path) -> Result<Self, ConversionErrors> {
        let content = read_to_string(file_path).map_err(|err| {
            ConversionErrors::InvalidConfig(format!("'{}': {err}", file_path.display()))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|err| ConversionErrors::InvalidConfig(err.to_string()))?;
        check_config_version(config.version())?;
        Ok(config)
    }
}

pub fn check_config_version(version: &str) -> Result<(), ConversionErrors> {
    if version != CONFIG_VERSION {
        return Err(ConversionErrors::WrongVersion(version.to_string()));
    }
    Ok(())
}

/// An explicitly given path must exist. A missing default file means defaults.
pub fn handle_config<T: ConfigFile>(
    config_path: Option<&str>,
    default_path: &str,
) -> Result<T, ConversionErrors> {
    if let Some(config_path) = config_path {
        log::info!("Loading config from '{config_path}'");
        return T::from_file(Path::new(config_path));
    }

    let default_path = PathBuf::from(default_path);
    if default_path.try_exists().unwrap_or(false) {
        log::info!("Loading config from '{}'", default_path.display());
        T::from_file(&default_path)
    } else {
        log::debug!(
            "No config file at '{}', using defaults",
            default_path.display()
        );
        Ok(T::default())
    }
}

//////////////////////////////////////////////////////////////////////////////
//                 ########  #######    #########  #########                //
//                    ##     ##        ##             ##                    //
//                    ##     #####     #########      ##                    //
//                    ##     ##                ##     ##                    //
//                    ##     #######   #########      ##                    //
//////////////////////////////////////////////////////////////////////////////
