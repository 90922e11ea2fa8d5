/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/// Returns true if `link` is an ARN in one of the AWS partitions
///
/// Only the `arn:<partition>:` prefix is checked. Anything else about the ARN is validated by STS.
pub fn is_arn(link: &str) -> bool {
    let partition = match link
        .strip_prefix("arn:")
        .and_then(|rest| rest.split_once(':'))
    {
        Some((partition, _)) => partition,
        None => return false,
    };
    partition == "aws" || partition.starts_with("aws-")
}
