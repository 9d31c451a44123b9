/* ************************************************************************ **
** This file is part of kdots, and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of kdots is provided under this permissive license,**
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

#![allow(non_snake_case)]

// Crate where serde_yaml code for the 'tasks' crate is monomorphized.
//
// The functions here also make use of serde_ignored to catch typos in the config.

// NOTE: Please make sure to use the YamlRead trait!
//       DO NOT USE serde_yaml::from_{reader,value,etc.} OUTSIDE THIS CRATE.

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;

use std::io::Read;

/// Provides an alternative to serde_yaml::from_reader where all of the
/// expensive codegen has already been performed in this crate.
pub trait YamlRead: for <'de> serde::Deserialize<'de> {
    fn from_reader(mut r: impl Read) -> Result<Self, serde_yaml::Error>
    { YamlRead::from_dyn_reader(&mut r) }

    fn from_dyn_reader(r: &mut dyn Read) -> Result<Self, serde_yaml::Error> {
        // serde_ignored needs a Deserializer, and serde_yaml only offers one
        // by way of Value.
        Self::from_value(value_from_dyn_reader(r)?)
    }

    fn from_value(value: serde_yaml::Value) -> Result<Self, serde_yaml::Error>;
}

macro_rules! derive_yaml_read {
    ($Type:ty) => {
        impl crate::YamlRead for $Type {
            // NOTE: Moving this body into a default fn definition on the trait
            //       appears to make codegen lazy, so it is generated here instead.
            fn from_value(value: serde_yaml::Value) -> Result<$Type, serde_yaml::Error> {
                serde_ignored::deserialize(
                    value,
                    |path| warn!("Unused config item (possible typo?): {}", path),
                )
            }
        }
    };
}

derive_yaml_read!{serde_yaml::Value}

// (this also exists solely for codegen reasons)
fn value_from_dyn_reader(r: &mut dyn Read) -> Result<serde_yaml::Value, serde_yaml::Error>
{ serde_yaml::from_reader(r) }

mod config;
mod validation;

pub use crate::config::*;
