//! Objective-C harness
//!
//! The user writes a C function `id solve(id input)` over Foundation
//! objects (`NSDictionary`, `NSArray`, `NSString`, `NSNumber`, `NSNull`).
//! JSON goes through `NSJSONSerialization` both ways.

use std::fmt::Write;

use crate::harness::literal::c_string_literal;
use crate::harness::{HarnessError, HarnessTemplate, Program, SourceBuilder, check_case_size};
use crate::language::SupportedLanguage;
use crate::types::TestCase;

const PRELUDE: &str = r#"#import <Foundation/Foundation.h>
#include <stdio.h>
#include <string.h>
#include <unistd.h>
"#;

const ENTRY: &str = r#"static BOOL __harness_isBool(id value) {
    return [value isKindOfClass:[NSNumber class]]
        && (value == (id)[NSNumber numberWithBool:YES] || value == (id)[NSNumber numberWithBool:NO]);
}

static BOOL __harness_isNull(id value) {
    return value == nil || [value isKindOfClass:[NSNull class]];
}

static BOOL __harness_equal(id a, id b) {
    if (__harness_isNull(a) || __harness_isNull(b)) {
        return __harness_isNull(a) && __harness_isNull(b);
    }
    BOOL boolA = __harness_isBool(a);
    BOOL boolB = __harness_isBool(b);
    if (boolA || boolB) {
        return boolA && boolB && [a boolValue] == [b boolValue];
    }
    if ([a isKindOfClass:[NSNumber class]] && [b isKindOfClass:[NSNumber class]]) {
        return [(NSNumber *)a compare:(NSNumber *)b] == NSOrderedSame;
    }
    if ([a isKindOfClass:[NSString class]] && [b isKindOfClass:[NSString class]]) {
        return [(NSString *)a isEqualToString:(NSString *)b];
    }
    if ([a isKindOfClass:[NSArray class]] && [b isKindOfClass:[NSArray class]]) {
        NSArray *x = a;
        NSArray *y = b;
        if (x.count != y.count) {
            return NO;
        }
        for (NSUInteger i = 0; i < x.count; i++) {
            if (!__harness_equal(x[i], y[i])) {
                return NO;
            }
        }
        return YES;
    }
    if ([a isKindOfClass:[NSDictionary class]] && [b isKindOfClass:[NSDictionary class]]) {
        NSDictionary *x = a;
        NSDictionary *y = b;
        if (x.count != y.count) {
            return NO;
        }
        for (id key in x) {
            id other = y[key];
            if (other == nil || !__harness_equal(x[key], other)) {
                return NO;
            }
        }
        return YES;
    }
    return NO;
}

static id __harness_parse(const char *text) {
    NSData *data = [NSData dataWithBytes:text length:strlen(text)];
    return [NSJSONSerialization JSONObjectWithData:data
                                           options:NSJSONReadingMutableContainers | NSJSONReadingAllowFragments
                                             error:NULL];
}

static void __harness_write_all(int fd, const void *bytes, size_t length) {
    size_t offset = 0;
    while (offset < length) {
        ssize_t written = write(fd, (const char *)bytes + offset, length - offset);
        if (written <= 0) {
            return;
        }
        offset += (size_t)written;
    }
}

int main(void) {
    @autoreleasepool {
        fflush(stdout);
        int out = dup(STDOUT_FILENO);
        dup2(STDERR_FILENO, STDOUT_FILENO);

        NSProcessInfo *process = [NSProcessInfo processInfo];
        NSMutableArray *entries = [NSMutableArray array];
        for (NSUInteger index = 0; __harness_cases[index][0] != NULL; index++) {
            id input = __harness_parse(__harness_cases[index][0]);
            id expected = __harness_parse(__harness_cases[index][1]);
            NSMutableDictionary *entry = [NSMutableDictionary dictionary];
            entry[@"index"] = @(index);
            entry[@"actualOutput"] = [NSNull null];
            entry[@"passed"] = @NO;

            NSTimeInterval start = process.systemUptime;
            @try {
                id actual = solve(input);
                entry[@"executionTimeMs"] = @((process.systemUptime - start) * 1000.0);
                if (actual == nil) {
                    actual = [NSNull null];
                }
                if ([NSJSONSerialization isValidJSONObject:@[ actual ]]) {
                    entry[@"actualOutput"] = actual;
                    entry[@"passed"] = @(__harness_equal(actual, expected));
                } else {
                    entry[@"error"] = @"result is not JSON serializable";
                }
            } @catch (NSException *exception) {
                entry[@"executionTimeMs"] = @((process.systemUptime - start) * 1000.0);
                entry[@"error"] = [NSString stringWithFormat:@"%@: %@", exception.name, exception.reason];
            }
            [entries addObject:entry];
        }

        NSError *error = nil;
        NSData *report = [NSJSONSerialization dataWithJSONObject:entries options:0 error:&error];
        if (report == nil) {
            fprintf(stderr, "harness: %s\n", error.localizedDescription.UTF8String);
            return 1;
        }
        fflush(stdout);
        __harness_write_all(out, report.bytes, report.length);
        __harness_write_all(out, "\n", 1);
    }
    return 0;
}
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectiveCHarness;

impl HarnessTemplate for ObjectiveCHarness {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::ObjectiveC
    }

    fn render(&self, user_code: &str, cases: &[TestCase]) -> Result<Program, HarnessError> {
        let mut data = String::from("static const char *const __harness_cases[][2] = {\n");
        for (index, case) in cases.iter().enumerate() {
            let input = c_string_literal(&case.input.to_string());
            let expected = c_string_literal(&case.expected_output.to_string());
            check_case_size(index, &[&input, &expected], self.max_case_bytes())?;
            let _ = writeln!(data, "    {{{input}, {expected}}},");
        }
        data.push_str("    {NULL, NULL},\n};\n");

        let mut source = SourceBuilder::new();
        source
            .prelude(PRELUDE)
            .data(&data)
            .user_code(user_code)
            .entry(ENTRY);
        Ok(Program::new(source.finish()))
    }
}
