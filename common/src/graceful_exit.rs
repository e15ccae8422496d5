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

use std::fmt::Display;

const FAILURE_EXIT_CODE: i32 = 1;

/// Turns fatal setup errors of the binary into a logged process exit.
pub trait ExitGracefully<T> {
    /// Logs `"{context}: {error}"` and exits with code 1 on `Err`.
    ///
    /// ```should_panic
    /// use common::graceful_exit::ExitGracefully;
    /// assert_eq!(Ok::<u8, String>(7).unwrap_or_exit("Loading"), 7);
    ///
    /// // exits with code 1 after logging "Loading: broken"
    /// Err::<u8, &str>("broken").unwrap_or_exit("Loading");
    /// ```
    fn unwrap_or_exit(self, context: &str) -> T;
}

impl<T, E: Display> ExitGracefully<T> for Result<T, E> {
    fn unwrap_or_exit(self, context: &str) -> T {
        self.unwrap_or_else(|error| {
            log::error!("{}", exit_message(context, &error));
            std::process::exit(FAILURE_EXIT_CODE)
        })
    }
}

fn exit_message(context: &str, error: &impl Display) -> String {
    format!("{context}: {error}")
}

//////////////////////////////////////////////////////////////////////////////
//                 ########  #######    #########  #########                //
//                    ##     ##        ##             ##                    //
//                    ##     #####     #########      ##                    //
//                    ##     ##                ##     ##                    //
//                    ##     #######   #########      ##                    //
//////////////////////////////////////////////////////////////////////////////
