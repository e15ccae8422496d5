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

use std::fmt::Debug;

pub trait IllegalStateResult<T> {
    fn unwrap_or_illegal_state(self) -> T;
}

impl<T, E: Debug> IllegalStateResult<T> for Result<T, E> {
    /// Returns the contained [`Ok`] value or panics with an illegal state
    /// message. Only for results that cannot fail unless the program itself
    /// is broken.
    ///
    /// # Examples
    ///
    /// ```should_panic
    /// use common::std_extensions::IllegalStateResult;
    /// assert_eq!(Ok::<&str, &str>("foo").unwrap_or_illegal_state(), "foo");
    ///
    /// // shall panic
    /// Err::<&str, &str>("some error").unwrap_or_illegal_state();
    /// ```
    fn unwrap_or_illegal_state(self) -> T {
        match self {
            Ok(value) => value,
            Err(error) => panic!("Illegal state: {error:?}"),
        }
    }
}
